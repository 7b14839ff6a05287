//! Error types for the question-answering pipeline.
//!
//! Each collaborator has its own error kind so callers can tell which step
//! failed. `AnswerError` wraps all three for `QueryAnswerer::answer`.

use thiserror::Error;

use crate::http::ProviderError;

/// Failure to turn a question into an embedding.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embedding service was unreachable or rejected the input
    #[error("Embedding request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The service answered but returned no embedding values
    #[error("Embedding service returned no embeddings")]
    Empty,
}

/// Failure to retrieve chunks from the vector store.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The remote store was unreachable or returned an error
    #[error("Vector store request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The local store database failed
    #[error("Vector store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The configured collection does not exist
    #[error("Collection '{name}' does not exist")]
    CollectionNotFound { name: String },

    /// The query vector does not match the collection's dimensionality
    #[error("Embedding has {actual} dimensions but the collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A retrieved chunk has no string `source` metadata
    #[error("Retrieved chunk {index} has no 'source' metadata")]
    MissingSource { index: usize },

    /// The store is otherwise unusable
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
}

/// Failure to generate an answer.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The generative model was unreachable or rejected the request
    #[error("Generation request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The model returned no text
    #[error("Model returned an empty response")]
    EmptyResponse,

    /// The provider refused to process the prompt
    #[error("Prompt was blocked by the provider: {reason}")]
    Blocked { reason: String },
}

/// Failure of a whole `answer()` call. There is no partial success.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl AnswerError {
    /// Returns true if the caller supplied bad input, as opposed to a
    /// collaborator failing.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::EmptyQuestion)
    }
}

/// Invalid configuration detected while building components.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing collaborator: {0} must be set")]
    MissingCollaborator(&'static str),

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f32),

    #[error("Fallback answer cannot be empty")]
    EmptyFallback,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
