use serde::{Deserialize, Serialize};

/// Free-form chunk metadata as stored by the vector store.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key naming the document a chunk was cut from.
pub const SOURCE_KEY: &str = "source";

/// A unit of previously indexed documentation text.
///
/// Chunks are owned by the vector store; this crate only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text
    pub text: String,
    /// Metadata attached at indexing time, expected to contain `source`
    pub metadata: Metadata,
    /// Distance to the query as reported by the store (smaller is nearer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl Chunk {
    /// Creates a chunk with the given text and metadata.
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
            distance: None,
        }
    }

    /// Creates a chunk whose metadata holds only a `source` entry.
    pub fn with_source(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(
            SOURCE_KEY.to_string(),
            serde_json::Value::String(source.into()),
        );
        Self::new(text, metadata)
    }

    /// Sets the distance reported by the store.
    pub fn at_distance(mut self, distance: f32) -> Self {
        self.distance = Some(distance);
        self
    }

    /// Returns the `source` metadata value if present and a string.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(|v| v.as_str())
    }
}
