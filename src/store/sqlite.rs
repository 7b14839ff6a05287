use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};

use super::schema::INITIAL_SCHEMA;
use crate::collaborators::VectorStore;
use crate::error::{ConfigError, RetrievalError};
use crate::models::{Chunk, Embedding, Metadata, SOURCE_KEY};

/// Distance function a collection was built with.
///
/// All metrics are distances: smaller means nearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// One minus cosine similarity
    Cosine,
    /// One minus the dot product
    InnerProduct,
}

impl DistanceMetric {
    /// Computes the distance between two vectors of equal length.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
            Self::InnerProduct => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::InnerProduct => "ip",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            "ip" => Ok(Self::InnerProduct),
            _ => Err(ConfigError::InvalidValue {
                key: "metric".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// A chunk together with its precomputed embedding, ready to be stored.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    /// Identifier unique within the collection; re-adding an id replaces the chunk
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Embedding,
}

impl IndexedChunk {
    /// Creates a chunk whose metadata holds only its `source`.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        let chunk = Chunk::with_source(text, source);
        Self {
            id: id.into(),
            text: chunk.text,
            metadata: chunk.metadata,
            embedding: Embedding::new(embedding),
        }
    }
}

struct CollectionInfo {
    id: i64,
    metric: DistanceMetric,
    dimension: usize,
}

/// Vector store backed by a local SQLite file.
///
/// Each handle is bound to one named collection. Search is exact: every
/// chunk in the collection is scored, which is fine for documentation-sized
/// corpora.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    collection: String,
}

impl SqliteVectorStore {
    /// Opens (or creates) the store file at `path`, bound to `collection`.
    ///
    /// The collection itself is not created; querying a collection that does
    /// not exist fails with `CollectionNotFound`.
    pub fn open(
        path: impl AsRef<Path>,
        collection: impl Into<String>,
    ) -> Result<Self, RetrievalError> {
        Self::with_connection(Connection::open(path)?, collection.into())
    }

    /// Opens an in-memory store bound to `collection`.
    pub fn in_memory(collection: impl Into<String>) -> Result<Self, RetrievalError> {
        Self::with_connection(Connection::open_in_memory()?, collection.into())
    }

    fn with_connection(conn: Connection, collection: String) -> Result<Self, RetrievalError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(INITIAL_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            collection,
        })
    }

    /// Returns the collection name this handle is bound to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Creates the bound collection. No-op if it already exists.
    pub fn create_collection(
        &self,
        metric: DistanceMetric,
        dimension: usize,
    ) -> Result<(), RetrievalError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, metric, dimension) VALUES (?1, ?2, ?3)",
            params![self.collection, metric.as_str(), dimension as i64],
        )?;
        Ok(())
    }

    /// Adds or replaces chunks in the bound collection.
    ///
    /// All chunks are written in one transaction. Every chunk must carry a
    /// string `source` and an embedding of the collection's dimension.
    pub fn add(&self, chunks: &[IndexedChunk]) -> Result<usize, RetrievalError> {
        let mut conn = self.lock()?;
        let info = find_collection(&conn, &self.collection)?;

        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.embedding.len() != info.dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: info.dimension,
                    actual: chunk.embedding.len(),
                });
            }
            if !chunk.metadata.get(SOURCE_KEY).is_some_and(|s| s.is_string()) {
                return Err(RetrievalError::MissingSource { index });
            }
        }

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (collection_id, chunk_id, document, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (collection_id, chunk_id) DO UPDATE SET
                     document = excluded.document,
                     metadata = excluded.metadata,
                     embedding = excluded.embedding",
            )?;
            for chunk in chunks {
                let metadata = serde_json::Value::Object(chunk.metadata.clone()).to_string();
                stmt.execute(params![
                    info.id,
                    chunk.id,
                    chunk.text,
                    metadata,
                    encode_embedding(chunk.embedding.as_slice()),
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(collection = %self.collection, added = chunks.len(), "stored chunks");
        Ok(chunks.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RetrievalError> {
        self.conn
            .lock()
            .map_err(|_| RetrievalError::Unavailable("store connection lock poisoned".to_string()))
    }
}

impl VectorStore for SqliteVectorStore {
    fn query(&self, embedding: &Embedding, k: usize) -> Result<Vec<Chunk>, RetrievalError> {
        let conn = self.lock()?;
        let info = find_collection(&conn, &self.collection)?;

        if embedding.len() != info.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: info.dimension,
                actual: embedding.len(),
            });
        }

        let mut stmt = conn.prepare(
            "SELECT document, metadata, embedding FROM chunks WHERE collection_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([info.id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (document, metadata, blob) = row?;
            let distance = info
                .metric
                .distance(embedding.as_slice(), &decode_embedding(&blob));
            let metadata: Metadata = serde_json::from_str(&metadata).map_err(|e| {
                RetrievalError::Unavailable(format!("corrupt chunk metadata: {}", e))
            })?;
            scored.push(Chunk::new(document, metadata).at_distance(distance));
        }

        // Stable sort keeps insertion order between equidistant chunks; NaN ranks last
        scored.sort_by(|a, b| rank_key(a).total_cmp(&rank_key(b)));
        scored.truncate(k);
        Ok(scored)
    }

    fn count(&self) -> Result<usize, RetrievalError> {
        let conn = self.lock()?;
        let info = find_collection(&conn, &self.collection)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE collection_id = ?1",
            [info.id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn find_collection(conn: &Connection, name: &str) -> Result<CollectionInfo, RetrievalError> {
    let row: Option<(i64, String, i64)> = conn
        .query_row(
            "SELECT id, metric, dimension FROM collections WHERE name = ?1",
            [name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let (id, metric, dimension) = row.ok_or_else(|| RetrievalError::CollectionNotFound {
        name: name.to_string(),
    })?;

    let metric = metric.parse::<DistanceMetric>().map_err(|_| {
        RetrievalError::Unavailable(format!(
            "unknown distance metric '{}' for collection '{}'",
            metric, name
        ))
    })?;

    Ok(CollectionInfo {
        id,
        metric,
        dimension: dimension as usize,
    })
}

fn rank_key(chunk: &Chunk) -> f32 {
    chunk
        .distance
        .filter(|d| !d.is_nan())
        .unwrap_or(f32::INFINITY)
}

fn encode_embedding(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
