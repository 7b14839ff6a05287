use serde::{Deserialize, Serialize};

/// A dense vector produced by an embedding model.
///
/// Dimensionality is fixed by the model that produced it. The vector is only
/// ever used as a query key, so it is read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wraps raw vector values.
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Returns the vector values.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Returns the dimensionality of the vector.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the vector has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_serializes_as_plain_array() {
        let embedding = Embedding::new(vec![0.5, -1.0]);
        let json = serde_json::to_string(&embedding).unwrap();
        assert_eq!(json, "[0.5,-1.0]");
    }

    #[test]
    fn empty_embedding_reports_empty() {
        let embedding = Embedding::from(Vec::new());
        assert!(embedding.is_empty());
        assert_eq!(embedding.len(), 0);
    }
}
