//! Retrieval-grounded question answering.

use std::sync::Arc;

use crate::collaborators::{Embedder, GenerationRequest, Generator, VectorStore};
use crate::error::{AnswerError, ConfigError, EmbeddingError, GenerationError, RetrievalError};
use crate::models::{AnswerRecord, collect_sources};

use super::prompt::{self, FALLBACK_ANSWER};

/// Number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Sampling temperature: low for consistency, non-zero for some variation.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Tunable constants of the answering pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswererConfig {
    top_k: usize,
    temperature: f32,
    fallback_answer: String,
    system_instruction: Option<String>,
}

impl Default for AnswererConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            fallback_answer: FALLBACK_ANSWER.to_string(),
            system_instruction: None,
        }
    }
}

impl AnswererConfig {
    /// Returns the number of chunks retrieved per question.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Returns the generation temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Returns the sentence the model uses when the context is insufficient.
    pub fn fallback_answer(&self) -> &str {
        &self.fallback_answer
    }

    /// Returns the system instruction sent with every question.
    ///
    /// Unless overridden, it is derived from the fallback sentence.
    pub fn system_instruction(&self) -> String {
        self.system_instruction
            .clone()
            .unwrap_or_else(|| prompt::system_instruction(&self.fallback_answer))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.fallback_answer.trim().is_empty() {
            return Err(ConfigError::EmptyFallback);
        }
        Ok(())
    }
}

/// Builder for constructing `QueryAnswerer` instances.
#[derive(Default)]
pub struct QueryAnswererBuilder {
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn VectorStore>>,
    generator: Option<Arc<dyn Generator>>,
    config: AnswererConfig,
}

impl QueryAnswererBuilder {
    /// Creates a new builder with default constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the embedding collaborator.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Sets the vector store collaborator.
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the generative collaborator.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Sets how many chunks are retrieved per question.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    /// Sets the generation temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Sets the fallback sentence (also used in the default system instruction).
    pub fn fallback_answer(mut self, fallback: impl Into<String>) -> Self {
        self.config.fallback_answer = fallback.into();
        self
    }

    /// Replaces the system instruction entirely.
    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.system_instruction = Some(instruction.into());
        self
    }

    /// Builds the `QueryAnswerer`.
    ///
    /// Fails if a collaborator is missing or a constant is out of range.
    pub fn build(self) -> Result<QueryAnswerer, ConfigError> {
        self.config.validate()?;
        Ok(QueryAnswerer {
            embedder: self
                .embedder
                .ok_or(ConfigError::MissingCollaborator("embedder"))?,
            store: self
                .store
                .ok_or(ConfigError::MissingCollaborator("store"))?,
            generator: self
                .generator
                .ok_or(ConfigError::MissingCollaborator("generator"))?,
            config: self.config,
        })
    }
}

/// Answers questions from retrieved documentation context.
///
/// Holds read-only handles to its collaborators; construct it once and share
/// it across requests.
pub struct QueryAnswerer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    config: AnswererConfig,
}

impl QueryAnswerer {
    /// Returns a builder.
    pub fn builder() -> QueryAnswererBuilder {
        QueryAnswererBuilder::new()
    }

    /// Returns the pipeline constants.
    pub fn config(&self) -> &AnswererConfig {
        &self.config
    }

    /// Returns the vector store (used by health checks).
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Answers a question from the `top_k` nearest documentation chunks.
    ///
    /// # Returns
    ///
    /// The model's answer and the distinct sources of the retrieved chunks.
    /// A fallback-sentence answer is still a success; any collaborator failure
    /// fails the whole call.
    pub fn answer(&self, question: &str) -> Result<AnswerRecord, AnswerError> {
        if question.trim().is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        let embedding = self.embedder.embed(question)?;
        if embedding.is_empty() {
            return Err(EmbeddingError::Empty.into());
        }

        let mut chunks = self.store.query(&embedding, self.config.top_k)?;
        chunks.truncate(self.config.top_k);

        if let Some(index) = chunks.iter().position(|chunk| chunk.source().is_none()) {
            return Err(RetrievalError::MissingSource { index }.into());
        }

        let context = prompt::build_context(&chunks);
        let sources = collect_sources(&chunks);

        tracing::debug!(question, context = %context, "retrieved context");
        tracing::info!(
            chunks = chunks.len(),
            sources = sources.len(),
            "answering question"
        );

        let system_instruction = self.config.system_instruction();
        let user_message = prompt::user_message(&context, question);
        let answer = self.generator.generate(&GenerationRequest {
            system_instruction: &system_instruction,
            user_message: &user_message,
            temperature: self.config.temperature,
        })?;
        if answer.trim().is_empty() {
            return Err(GenerationError::EmptyResponse.into());
        }

        Ok(AnswerRecord::new(answer, sources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::http::ProviderError;
    use crate::models::{Chunk, Embedding};

    struct MockEmbedder {
        result: fn() -> Result<Embedding, EmbeddingError>,
    }

    impl Embedder for MockEmbedder {
        fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            (self.result)()
        }
    }

    struct MockStore {
        chunks: Vec<Chunk>,
        requested_k: Mutex<Option<usize>>,
    }

    impl VectorStore for MockStore {
        fn query(&self, _embedding: &Embedding, k: usize) -> Result<Vec<Chunk>, RetrievalError> {
            *self.requested_k.lock().unwrap() = Some(k);
            Ok(self.chunks.clone())
        }

        fn count(&self) -> Result<usize, RetrievalError> {
            Ok(self.chunks.len())
        }
    }

    /// Records the last request and echoes a fixed response.
    struct MockGenerator {
        response: String,
        last_request: Mutex<Option<(String, String, f32)>>,
    }

    impl Generator for MockGenerator {
        fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
            *self.last_request.lock().unwrap() = Some((
                request.system_instruction.to_string(),
                request.user_message.to_string(),
                request.temperature,
            ));
            Ok(self.response.clone())
        }
    }

    fn ok_embedding() -> Result<Embedding, EmbeddingError> {
        Ok(Embedding::new(vec![0.1, 0.2, 0.3]))
    }

    fn mocks(chunks: Vec<Chunk>) -> (Arc<MockStore>, Arc<MockGenerator>) {
        let store = Arc::new(MockStore {
            chunks,
            requested_k: Mutex::new(None),
        });
        let generator = Arc::new(MockGenerator {
            response: "Set `site_name` in mkdocs.yml.".to_string(),
            last_request: Mutex::new(None),
        });
        (store, generator)
    }

    fn answerer(store: Arc<MockStore>, generator: Arc<MockGenerator>) -> QueryAnswerer {
        QueryAnswerer::builder()
            .embedder(Arc::new(MockEmbedder {
                result: ok_embedding,
            }))
            .store(store)
            .generator(generator)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_requires_all_collaborators() {
        let result = QueryAnswerer::builder()
            .embedder(Arc::new(MockEmbedder {
                result: ok_embedding,
            }))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingCollaborator("store"))
        ));
    }

    #[test]
    fn builder_validates_constants() {
        let (store, generator) = mocks(vec![]);
        let base = || {
            QueryAnswerer::builder()
                .embedder(Arc::new(MockEmbedder {
                    result: ok_embedding,
                }))
                .store(store.clone())
                .generator(generator.clone())
        };

        assert!(matches!(base().top_k(0).build(), Err(ConfigError::InvalidTopK)));
        assert!(matches!(
            base().temperature(2.5).build(),
            Err(ConfigError::InvalidTemperature(_))
        ));
        assert!(matches!(
            base().fallback_answer("  ").build(),
            Err(ConfigError::EmptyFallback)
        ));
    }

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = AnswererConfig::default();
        assert_eq!(config.top_k(), 5);
        assert!((config.temperature() - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.fallback_answer(), FALLBACK_ANSWER);
        assert!(config.system_instruction().contains(FALLBACK_ANSWER));
    }

    #[test]
    fn answer_sends_grounded_prompt() {
        let (store, generator) = mocks(vec![
            Chunk::with_source("site_name: My Docs", "docs/configuration.md"),
            Chunk::with_source("nav: [...]", "docs/writing.md"),
        ]);
        let answerer = answerer(store.clone(), generator.clone());

        let record = answerer.answer("How do I change the site name?").unwrap();

        assert_eq!(record.answer, "Set `site_name` in mkdocs.yml.");
        assert_eq!(*store.requested_k.lock().unwrap(), Some(DEFAULT_TOP_K));

        let (system, user, temperature) = generator.last_request.lock().unwrap().clone().unwrap();
        assert!(system.contains(FALLBACK_ANSWER));
        assert_eq!(
            user,
            "Context: site_name: My Docs\n\n---\n\nnav: [...]\n\nQuestion: How do I change the site name?"
        );
        assert!((temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_question_is_rejected_before_embedding() {
        let answerer = QueryAnswerer::builder()
            .embedder(Arc::new(MockEmbedder {
                result: || panic!("embedder must not be called"),
            }))
            .store(mocks(vec![]).0)
            .generator(mocks(vec![]).1)
            .build()
            .unwrap();

        assert!(matches!(answerer.answer(""), Err(AnswerError::EmptyQuestion)));
        assert!(matches!(answerer.answer(" \n\t"), Err(AnswerError::EmptyQuestion)));
    }

    #[test]
    fn embedding_failure_fails_the_answer() {
        let (store, generator) = mocks(vec![Chunk::with_source("x", "a.md")]);
        let answerer = QueryAnswerer::builder()
            .embedder(Arc::new(MockEmbedder {
                result: || {
                    Err(EmbeddingError::Provider(ProviderError::Http {
                        status: 400,
                        message: "input rejected".to_string(),
                    }))
                },
            }))
            .store(store.clone())
            .generator(generator.clone())
            .build()
            .unwrap();

        let result = answerer.answer("anything");
        assert!(matches!(result, Err(AnswerError::Embedding(_))));
        assert!(store.requested_k.lock().unwrap().is_none());
        assert!(generator.last_request.lock().unwrap().is_none());
    }

    #[test]
    fn extra_chunks_are_truncated_to_k() {
        let chunks = (0..4)
            .map(|i| Chunk::with_source(format!("chunk {i}"), format!("docs/{i}.md")))
            .collect();
        let (store, generator) = mocks(chunks);
        let answerer = QueryAnswerer::builder()
            .embedder(Arc::new(MockEmbedder {
                result: ok_embedding,
            }))
            .store(store)
            .generator(generator.clone())
            .top_k(2)
            .build()
            .unwrap();

        let record = answerer.answer("q").unwrap();
        assert_eq!(record.sources.len(), 2);

        let (_, user, _) = generator.last_request.lock().unwrap().clone().unwrap();
        assert!(user.contains("chunk 1"));
        assert!(!user.contains("chunk 2"));
    }

    #[test]
    fn chunk_without_source_is_a_retrieval_error() {
        let (store, generator) = mocks(vec![
            Chunk::with_source("fine", "a.md"),
            Chunk::new("orphan", Default::default()),
        ]);
        let answerer = answerer(store, generator.clone());

        let result = answerer.answer("q");
        assert!(matches!(
            result,
            Err(AnswerError::Retrieval(RetrievalError::MissingSource { index: 1 }))
        ));
        assert!(generator.last_request.lock().unwrap().is_none());
    }

    #[test]
    fn custom_fallback_flows_into_system_instruction() {
        let (store, generator) = mocks(vec![]);
        let answerer = QueryAnswerer::builder()
            .embedder(Arc::new(MockEmbedder {
                result: ok_embedding,
            }))
            .store(store)
            .generator(generator.clone())
            .fallback_answer("Not documented.")
            .build()
            .unwrap();

        answerer.answer("q").unwrap();
        let (system, user, _) = generator.last_request.lock().unwrap().clone().unwrap();
        assert!(system.contains("say: \"Not documented.\""));
        assert_eq!(user, "Context: \n\nQuestion: q");
    }

    #[test]
    fn empty_embedding_is_rejected_before_retrieval() {
        let (store, generator) = mocks(vec![Chunk::with_source("x", "a.md")]);
        let answerer = QueryAnswerer::builder()
            .embedder(Arc::new(MockEmbedder {
                result: || Ok(Embedding::new(vec![])),
            }))
            .store(store.clone())
            .generator(generator.clone())
            .build()
            .unwrap();

        let result = answerer.answer("How do I add a page?");
        assert!(matches!(
            result,
            Err(AnswerError::Embedding(EmbeddingError::Empty))
        ));
        assert!(store.requested_k.lock().unwrap().is_none());
        assert!(generator.last_request.lock().unwrap().is_none());
    }

    #[test]
    fn blank_generation_is_an_empty_response() {
        for response in ["", "  \n\t"] {
            let store = Arc::new(MockStore {
                chunks: vec![Chunk::with_source("x", "a.md")],
                requested_k: Mutex::new(None),
            });
            let generator = Arc::new(MockGenerator {
                response: response.to_string(),
                last_request: Mutex::new(None),
            });
            let answerer = answerer(store, generator);

            let result = answerer.answer("q");
            assert!(
                matches!(
                    result,
                    Err(AnswerError::Generation(GenerationError::EmptyResponse))
                ),
                "response {response:?} gave {result:?}"
            );
        }
    }
}
