//! Vector store backends.
//!
//! - `ChromaStore` queries a Chroma server over HTTP
//! - `SqliteVectorStore` keeps a collection in a local SQLite file
mod chroma;
mod schema;
mod sqlite;

pub use chroma::{
    ChromaStore, ChromaStoreBuilder, DEFAULT_CHROMA_DATABASE, DEFAULT_CHROMA_TENANT,
    DEFAULT_CHROMA_URL,
};
pub use sqlite::{DistanceMetric, IndexedChunk, SqliteVectorStore};
