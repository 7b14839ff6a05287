//! Interfaces to the external services the answerer depends on.
//!
//! These traits enable mocking in unit tests and keep the answerer independent
//! of any particular embedding API, vector database or language model.

use crate::error::{EmbeddingError, GenerationError, RetrievalError};
use crate::models::{Chunk, Embedding};

/// Turns text into an embedding vector.
pub trait Embedder: Send + Sync {
    /// Embeds a single piece of text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;
}

/// Nearest-neighbour lookup over previously indexed chunks.
pub trait VectorStore: Send + Sync {
    /// Returns up to `k` chunks ordered nearest first, with text and metadata.
    fn query(&self, embedding: &Embedding, k: usize) -> Result<Vec<Chunk>, RetrievalError>;

    /// Returns the number of chunks in the collection.
    fn count(&self) -> Result<usize, RetrievalError>;
}

/// A single generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationRequest<'a> {
    /// Instruction the model must follow for the whole exchange
    pub system_instruction: &'a str,
    /// The user turn, carrying context and question
    pub user_message: &'a str,
    /// Sampling temperature
    pub temperature: f32,
}

/// Produces text from a system instruction and a user message.
pub trait Generator: Send + Sync {
    /// Generates a response, returning its text.
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError>;
}
