//! Gemini REST client implementation.
//!
//! `GeminiClient` speaks the Generative Language API (`v1beta`): `embedContent`
//! for question embeddings and `generateContent` for grounded answers.
use serde::{Deserialize, Serialize};

use crate::collaborators::{Embedder, GenerationRequest, Generator};
use crate::error::{EmbeddingError, GenerationError};
use crate::http::{self, ProviderError, RetryPolicy};
use crate::models::Embedding;

/// Public Generative Language API endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default generation model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default embedding model.
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Builder for constructing `GeminiClient` instances.
#[derive(Debug, Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    retry: Option<RetryPolicy>,
}

impl GeminiClientBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY` when not called.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API endpoint (mainly for tests and proxies).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the generation model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the embedding model.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Overrides the retry schedule for transient failures.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Builds the client.
    ///
    /// Fails with `MissingApiKey` if no non-empty key is configured and with
    /// `InvalidUrl` if the base URL does not parse.
    pub fn build(self) -> Result<GeminiClient, ProviderError> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(API_KEY_VAR).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ProviderError::MissingApiKey { var: API_KEY_VAR })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        Ok(GeminiClient {
            client: http::build_client()?,
            base_url: http::normalize_base_url(&base_url)?,
            api_key,
            model: self
                .model
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_GEMINI_EMBEDDING_MODEL.to_string()),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Synchronous client for the Gemini API.
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Metadata returned by the model lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Resource name, e.g. `models/gemini-2.0-flash`
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub input_token_limit: Option<u64>,
}

impl GeminiClient {
    /// Returns the API endpoint.
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

    /// Looks up a model, confirming the key is valid and the model exists.
    pub fn model_info(&self, model: &str) -> Result<ModelInfo, ProviderError> {
        let url = format!("{}/{}/models/{}", self.base_url, API_VERSION, model);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .map_err(ProviderError::from_reqwest)?;
        http::read_json(response)
    }

    fn call<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        model: &str,
        method: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let url = format!(
            "{}/{}/models/{}:{}",
            self.base_url, API_VERSION, model, method
        );
        http::retry_with_backoff(&self.retry, || {
            let response = self
                .client
                .post(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .json(body)
                .send()
                .map_err(ProviderError::from_reqwest)?;
            http::read_json(response)
        })
    }
}

impl Embedder for GeminiClient {
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        tracing::debug!(
            model = %self.embedding_model,
            text_len = text.len(),
            "gemini embedContent"
        );

        let request = EmbedContentRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content::text(None, text),
        };
        let response: EmbedContentResponse =
            self.call(&self.embedding_model, "embedContent", &request)?;

        response
            .embedding
            .map(|e| e.values)
            .filter(|values| !values.is_empty())
            .map(Embedding::new)
            .ok_or(EmbeddingError::Empty)
    }
}

impl Generator for GeminiClient {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        tracing::debug!(
            model = %self.model,
            temperature = request.temperature,
            "gemini generateContent"
        );

        let body = GenerateContentRequest {
            system_instruction: Content::text(None, request.system_instruction),
            contents: vec![Content::text(Some("user"), request.user_message)],
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        };
        let response: GenerateContentResponse =
            self.call(&self.model, "generateContent", &body)?;

        extract_text(response)
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(GenerationError::Blocked { reason }),
            None => Err(GenerationError::EmptyResponse),
        };
    };

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}
