//! Ollama HTTP client implementation.
//!
//! This module provides `OllamaClient` for making synchronous HTTP requests to the Ollama API.
//! It serves both collaborator roles: embeddings via `/api/embed` and answers via
//! `/api/generate`.
use serde::{Deserialize, Serialize};

use crate::collaborators::{Embedder, GenerationRequest, Generator};
use crate::error::{EmbeddingError, GenerationError};
use crate::http::{self, ProviderError, RetryPolicy};
use crate::models::Embedding;

/// Default Ollama endpoint when neither the builder nor `OLLAMA_HOST` set one.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Default generation model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Default embedding model.
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use mkdocs_rag::providers::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .model("llama3.2")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.model(), "llama3.2");
/// ```
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    retry: Option<RetryPolicy>,
}

impl OllamaClientBuilder {
    /// Creates a new `OllamaClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL for the Ollama API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model used for generation.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the model used for embeddings.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Overrides the retry schedule for transient failures.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Builds the `OllamaClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, `OLLAMA_HOST` is used, then
    /// `http://localhost:11434`. If `model()` was not called, `OLLAMA_MODEL` is
    /// used, then `llama3.2`. If `embedding_model()` was not called,
    /// `OLLAMA_EMBEDDING_MODEL` is used, then `nomic-embed-text`.
    pub fn build(self) -> Result<OllamaClient, ProviderError> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("OLLAMA_HOST").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());

        let model = self
            .model
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());

        let embedding_model = self
            .embedding_model
            .or_else(|| std::env::var("OLLAMA_EMBEDDING_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string());

        Ok(OllamaClient {
            client: http::build_client()?,
            base_url: http::normalize_base_url(&base_url)?,
            model,
            embedding_model,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Synchronous HTTP client for the Ollama API.
///
/// It should be constructed using `OllamaClientBuilder`.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    embedding_model: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

impl OllamaClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the generation model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the embedding model name.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Lists available models from the Ollama API, sorted by size (largest first).
    pub fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(ProviderError::from_reqwest)?;
        let json: serde_json::Value = http::read_json(response)?;

        let mut models: Vec<(String, u64)> = json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|model| {
                        let name = model.get("name").and_then(|n| n.as_str())?;
                        let size = model.get("size").and_then(|s| s.as_u64()).unwrap_or(0);
                        Some((name.to_string(), size))
                    })
                    .collect()
            })
            .unwrap_or_default();

        models.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(models.into_iter().map(|(name, _)| name).collect())
    }

    fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        http::retry_with_backoff(&self.retry, || {
            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .map_err(ProviderError::from_reqwest)?;
            http::read_json(response)
        })
    }
}

impl Embedder for OllamaClient {
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        tracing::debug!(model = %self.embedding_model, text_len = text.len(), "ollama embed");

        let response: EmbedResponse = self.post(
            "/api/embed",
            &EmbedRequest {
                model: &self.embedding_model,
                input: text,
            },
        )?;

        response
            .embeddings
            .into_iter()
            .next()
            .filter(|values| !values.is_empty())
            .map(Embedding::new)
            .ok_or(EmbeddingError::Empty)
    }
}

impl Generator for OllamaClient {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        tracing::debug!(model = %self.model, temperature = request.temperature, "ollama generate");

        let response: GenerateResponse = self.post(
            "/api/generate",
            &GenerateRequest {
                model: &self.model,
                system: request.system_instruction,
                prompt: request.user_message,
                stream: false,
                options: GenerateOptions {
                    temperature: request.temperature,
                },
            },
        )?;

        response
            .response
            .filter(|text| !text.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}
