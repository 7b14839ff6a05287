use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::collaborators::VectorStore;
use crate::error::RetrievalError;
use crate::http::{self, ProviderError, RetryPolicy};
use crate::models::{Chunk, Embedding, Metadata};

/// Default Chroma server address.
pub const DEFAULT_CHROMA_URL: &str = "http://localhost:8000";

/// Default Chroma tenant.
pub const DEFAULT_CHROMA_TENANT: &str = "default_tenant";

/// Default Chroma database.
pub const DEFAULT_CHROMA_DATABASE: &str = "default_database";

/// Builder for constructing `ChromaStore` instances.
#[derive(Debug, Default)]
pub struct ChromaStoreBuilder {
    base_url: Option<String>,
    tenant: Option<String>,
    database: Option<String>,
    retry: Option<RetryPolicy>,
}

impl ChromaStoreBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server address. Falls back to `CHROMA_URL`, then `http://localhost:8000`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the tenant.
    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Sets the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Overrides the retry schedule for transient failures.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Builds a store bound to `collection`.
    ///
    /// No request is made here; the collection is resolved on first use.
    pub fn build(self, collection: impl Into<String>) -> Result<ChromaStore, ProviderError> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("CHROMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_CHROMA_URL.to_string());

        Ok(ChromaStore {
            client: http::build_client()?,
            base_url: http::normalize_base_url(&base_url)?,
            tenant: self
                .tenant
                .unwrap_or_else(|| DEFAULT_CHROMA_TENANT.to_string()),
            database: self
                .database
                .unwrap_or_else(|| DEFAULT_CHROMA_DATABASE.to_string()),
            collection: collection.into(),
            collection_id: OnceLock::new(),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Vector store backed by a Chroma server (HTTP API v2).
pub struct ChromaStore {
    client: reqwest::blocking::Client,
    base_url: String,
    tenant: String,
    database: String,
    collection: String,
    collection_id: OnceLock<String>,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct CollectionModel {
    id: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: [&'a [f32]; 1],
    n_results: usize,
    include: [&'static str; 3],
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    documents: Option<Vec<Vec<Option<String>>>>,
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    /// Converts the first query row into chunks, nearest first.
    fn into_chunks(self) -> Vec<Chunk> {
        let count = self.ids.into_iter().next().map_or(0, |row| row.len());
        let mut documents = first_row(self.documents);
        let mut metadatas = first_row(self.metadatas);
        let mut distances = first_row(self.distances);

        (0..count)
            .map(|i| {
                let text = documents.get_mut(i).and_then(Option::take).unwrap_or_default();
                let metadata = metadatas.get_mut(i).and_then(Option::take).unwrap_or_default();
                let chunk = Chunk::new(text, metadata);
                match distances.get_mut(i).and_then(Option::take) {
                    Some(distance) => chunk.at_distance(distance),
                    None => chunk,
                }
            })
            .collect()
    }
}

fn first_row<T>(rows: Option<Vec<Vec<Option<T>>>>) -> Vec<Option<T>> {
    rows.and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
}

impl ChromaStore {
    /// Returns the server address.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the collection name this store is bound to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    /// Resolves the collection id by name, once per store.
    fn collection_id(&self) -> Result<&str, RetrievalError> {
        if let Some(id) = self.collection_id.get() {
            return Ok(id.as_str());
        }

        let url = format!("{}/{}", self.collections_url(), self.collection);
        let model: CollectionModel = self.send_with_retry(|| self.client.get(&url))?;

        tracing::debug!(
            collection = %self.collection,
            id = %model.id,
            "resolved chroma collection"
        );
        Ok(self.collection_id.get_or_init(|| model.id).as_str())
    }

    /// Sends a request built by `request`, retrying transient failures.
    ///
    /// A missing collection is never retried, even when the server reports
    /// it with a 5xx status.
    fn send_with_retry<T, R>(&self, request: R) -> Result<T, RetrievalError>
    where
        T: serde::de::DeserializeOwned,
        R: Fn() -> reqwest::blocking::RequestBuilder,
    {
        let retryable = |e: &ProviderError| http::is_transient(e) && !is_not_found(e);
        http::retry_with_backoff_if(&self.retry, retryable, || {
            let response = request().send().map_err(ProviderError::from_reqwest)?;
            http::read_json(response)
        })
        .map_err(|e| self.map_error(e))
    }

    /// Maps "collection does not exist" responses to `CollectionNotFound`.
    fn map_error(&self, error: ProviderError) -> RetrievalError {
        if is_not_found(&error) {
            RetrievalError::CollectionNotFound {
                name: self.collection.clone(),
            }
        } else {
            RetrievalError::Provider(error)
        }
    }
}

impl VectorStore for ChromaStore {
    fn query(&self, embedding: &Embedding, k: usize) -> Result<Vec<Chunk>, RetrievalError> {
        let url = format!("{}/{}/query", self.collections_url(), self.collection_id()?);
        let request = QueryRequest {
            query_embeddings: [embedding.as_slice()],
            n_results: k,
            include: ["documents", "metadatas", "distances"],
        };

        let response: QueryResponse =
            self.send_with_retry(|| self.client.post(&url).json(&request))?;

        Ok(response.into_chunks())
    }

    fn count(&self) -> Result<usize, RetrievalError> {
        let url = format!("{}/{}/count", self.collections_url(), self.collection_id()?);
        self.send_with_retry(|| self.client.get(&url))
    }
}

/// Chroma answers a missing collection with 404, or with a 500 carrying
/// "does not exist" on older servers.
fn is_not_found(error: &ProviderError) -> bool {
    match error {
        ProviderError::Http { status: 404, .. } => true,
        ProviderError::Http { message, .. } => message.contains("does not exist"),
        _ => false,
    }
}
