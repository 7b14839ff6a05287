pub mod answerer;
pub mod chat;
pub mod collaborators;
pub mod config;
pub mod display;
pub mod doctor;
pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod providers;
pub mod setup;
pub mod store;

pub use answerer::{AnswererConfig, FALLBACK_ANSWER, QueryAnswerer, QueryAnswererBuilder};
pub use chat::{ChatMessage, ChatSession, Role};
pub use collaborators::{Embedder, GenerationRequest, Generator, VectorStore};
pub use config::{ProviderKind, Settings, StoreKind};
pub use display::{illustrative_images, is_image_source};
pub use error::{AnswerError, ConfigError, EmbeddingError, GenerationError, RetrievalError};
pub use http::{ProviderError, RetryPolicy};
pub use models::{AnswerRecord, Chunk, Embedding, Metadata, SourceSet};
pub use providers::{GeminiClient, GeminiClientBuilder, OllamaClient, OllamaClientBuilder};
pub use store::{ChromaStore, ChromaStoreBuilder, DistanceMetric, IndexedChunk, SqliteVectorStore};
