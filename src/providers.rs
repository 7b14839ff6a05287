//! Model providers serving as embedding and generation collaborators.
mod gemini;
mod ollama;

pub use gemini::{
    API_KEY_VAR, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_EMBEDDING_MODEL, DEFAULT_GEMINI_MODEL,
    GeminiClient, GeminiClientBuilder, ModelInfo,
};
pub use ollama::{
    DEFAULT_OLLAMA_EMBEDDING_MODEL, DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_MODEL, OllamaClient,
    OllamaClientBuilder,
};
