//! Runtime settings loaded from the environment.
//!
//! `.env` files are loaded by the binary before `Settings::from_env` runs, so
//! every value below can live there too. CLI flags override these values.

use std::path::PathBuf;
use std::str::FromStr;

use crate::answerer::{DEFAULT_TEMPERATURE, DEFAULT_TOP_K};
use crate::error::ConfigError;
use crate::providers::{
    DEFAULT_GEMINI_EMBEDDING_MODEL, DEFAULT_GEMINI_MODEL, DEFAULT_OLLAMA_EMBEDDING_MODEL,
    DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_MODEL,
};
use crate::store::{DEFAULT_CHROMA_DATABASE, DEFAULT_CHROMA_TENANT, DEFAULT_CHROMA_URL};

/// Collection the documentation corpus was indexed into.
pub const DEFAULT_COLLECTION: &str = "MkDocs_Guides";

/// Which service provides embeddings and answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProviderKind {
    Gemini,
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "RAG_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Which vector store holds the indexed chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreKind {
    Chroma,
    Sqlite,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chroma" => Ok(Self::Chroma),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(ConfigError::InvalidValue {
                key: "RAG_STORE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// All runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: ProviderKind,
    pub store: StoreKind,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_embedding_model: String,
    pub ollama_host: String,
    pub ollama_model: String,
    pub ollama_embedding_model: String,
    pub chroma_url: String,
    pub chroma_tenant: String,
    pub chroma_database: String,
    pub collection: String,
    pub db_path: PathBuf,
    pub top_k: usize,
    pub temperature: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            store: StoreKind::Chroma,
            google_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_embedding_model: DEFAULT_GEMINI_EMBEDDING_MODEL.to_string(),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_embedding_model: DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string(),
            chroma_url: DEFAULT_CHROMA_URL.to_string(),
            chroma_tenant: DEFAULT_CHROMA_TENANT.to_string(),
            chroma_database: DEFAULT_CHROMA_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            db_path: default_db_path(),
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl Settings {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults for unset keys.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            provider: get("RAG_PROVIDER")
                .map(|v| v.parse::<ProviderKind>())
                .transpose()?
                .unwrap_or(defaults.provider),
            store: get("RAG_STORE")
                .map(|v| v.parse::<StoreKind>())
                .transpose()?
                .unwrap_or(defaults.store),
            google_api_key: get("GOOGLE_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_embedding_model: get("GEMINI_EMBEDDING_MODEL")
                .unwrap_or(defaults.gemini_embedding_model),
            ollama_host: get("OLLAMA_HOST").unwrap_or(defaults.ollama_host),
            ollama_model: get("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            ollama_embedding_model: get("OLLAMA_EMBEDDING_MODEL")
                .unwrap_or(defaults.ollama_embedding_model),
            chroma_url: get("CHROMA_URL").unwrap_or(defaults.chroma_url),
            chroma_tenant: get("CHROMA_TENANT").unwrap_or(defaults.chroma_tenant),
            chroma_database: get("CHROMA_DATABASE").unwrap_or(defaults.chroma_database),
            collection: get("RAG_COLLECTION").unwrap_or(defaults.collection),
            db_path: get("RAG_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            top_k: parse_number("RAG_TOP_K", get("RAG_TOP_K"))?.unwrap_or(defaults.top_k),
            temperature: parse_number("RAG_TEMPERATURE", get("RAG_TEMPERATURE"))?
                .unwrap_or(defaults.temperature),
        })
    }
}

fn parse_number<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: v.clone(),
            })
        })
        .transpose()
}

/// Returns the default local store path.
///
/// `{data_dir}/mkdocs-rag/mkdocs_db/chunks.sqlite3` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// Falls back to a relative `mkdocs_db/chunks.sqlite3` when the platform has
/// no data directory.
pub fn default_db_path() -> PathBuf {
    let relative = PathBuf::from("mkdocs_db").join("chunks.sqlite3");
    match dirs::data_dir() {
        Some(dir) => dir.join("mkdocs-rag").join(relative),
        None => relative,
    }
}
