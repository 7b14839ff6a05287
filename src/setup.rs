//! Wiring from `Settings` to a ready `QueryAnswerer`.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::answerer::QueryAnswerer;
use crate::collaborators::{Embedder, Generator, VectorStore};
use crate::config::{ProviderKind, Settings, StoreKind};
use crate::providers::{GeminiClientBuilder, OllamaClientBuilder};
use crate::store::{ChromaStoreBuilder, SqliteVectorStore};

/// Builds the embedding and generation collaborators for the configured provider.
///
/// Both roles are served by one client instance.
pub fn build_provider(settings: &Settings) -> Result<(Arc<dyn Embedder>, Arc<dyn Generator>)> {
    match settings.provider {
        ProviderKind::Gemini => {
            let mut builder = GeminiClientBuilder::new()
                .model(&settings.gemini_model)
                .embedding_model(&settings.gemini_embedding_model);
            if let Some(key) = &settings.google_api_key {
                builder = builder.api_key(key);
            }
            let client = Arc::new(builder.build().context("Failed to create Gemini client")?);
            let embedder: Arc<dyn Embedder> = client.clone();
            let generator: Arc<dyn Generator> = client;
            Ok((embedder, generator))
        }
        ProviderKind::Ollama => {
            let client = Arc::new(
                OllamaClientBuilder::new()
                    .base_url(&settings.ollama_host)
                    .model(&settings.ollama_model)
                    .embedding_model(&settings.ollama_embedding_model)
                    .build()
                    .context("Failed to create Ollama client")?,
            );
            let embedder: Arc<dyn Embedder> = client.clone();
            let generator: Arc<dyn Generator> = client;
            Ok((embedder, generator))
        }
    }
}

/// Opens the configured vector store.
pub fn build_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    match settings.store {
        StoreKind::Chroma => {
            let store = ChromaStoreBuilder::new()
                .base_url(&settings.chroma_url)
                .tenant(&settings.chroma_tenant)
                .database(&settings.chroma_database)
                .build(&settings.collection)
                .context("Failed to create Chroma client")?;
            Ok(Arc::new(store))
        }
        StoreKind::Sqlite => {
            if let Some(parent) = settings.db_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory: {}", parent.display())
                })?;
            }
            let store = SqliteVectorStore::open(&settings.db_path, &settings.collection)
                .with_context(|| {
                    format!("Failed to open store: {}", settings.db_path.display())
                })?;
            Ok(Arc::new(store))
        }
    }
}

/// Builds a `QueryAnswerer` from settings.
pub fn build_answerer(settings: &Settings) -> Result<QueryAnswerer> {
    let (embedder, generator) = build_provider(settings)?;
    let store = build_store(settings)?;

    let answerer = QueryAnswerer::builder()
        .embedder(embedder)
        .store(store)
        .generator(generator)
        .top_k(settings.top_k)
        .temperature(settings.temperature)
        .build()?;

    Ok(answerer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use tempfile::tempdir;

    #[test]
    fn sqlite_store_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            store: StoreKind::Sqlite,
            db_path: dir.path().join("nested").join("chunks.sqlite3"),
            ..Settings::default()
        };

        let store = build_store(&settings).unwrap();
        assert!(settings.db_path.exists());
        // Collection was never created
        assert!(store.count().is_err());
    }

    #[test]
    fn ollama_answerer_builds_without_network() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            provider: ProviderKind::Ollama,
            store: StoreKind::Sqlite,
            db_path: dir.path().join("chunks.sqlite3"),
            top_k: 3,
            ..Settings::default()
        };

        let answerer = build_answerer(&settings).unwrap();
        assert_eq!(answerer.config().top_k(), 3);
    }

    #[test]
    fn invalid_top_k_is_a_config_error() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            provider: ProviderKind::Ollama,
            store: StoreKind::Sqlite,
            db_path: dir.path().join("chunks.sqlite3"),
            top_k: 0,
            ..Settings::default()
        };

        let err = build_answerer(&settings).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidTopK)
        ));
    }

    #[test]
    fn gemini_with_explicit_key_builds() {
        let settings = Settings {
            google_api_key: Some("test-key".to_string()),
            ..Settings::default()
        };
        assert!(build_provider(&settings).is_ok());
    }
}
