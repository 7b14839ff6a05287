//! End-to-end answer scenarios with stub collaborators.

use std::sync::{Arc, Mutex};

use mkdocs_rag::answerer::CONTEXT_SEPARATOR;
use mkdocs_rag::{
    AnswerError, Chunk, Embedder, Embedding, EmbeddingError, FALLBACK_ANSWER, GenerationError,
    GenerationRequest, Generator, ProviderError, QueryAnswerer, RetrievalError, VectorStore,
    illustrative_images,
};

struct StubEmbedder {
    calls: Mutex<usize>,
}

impl StubEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
        })
    }
}

impl Embedder for StubEmbedder {
    fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
        *self.calls.lock().unwrap() += 1;
        Ok(Embedding::new(vec![0.1, 0.2, 0.3]))
    }
}

struct StubStore {
    chunks: Vec<Chunk>,
}

impl VectorStore for StubStore {
    fn query(&self, _embedding: &Embedding, _k: usize) -> Result<Vec<Chunk>, RetrievalError> {
        Ok(self.chunks.clone())
    }

    fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.chunks.len())
    }
}

struct FailingStore;

impl VectorStore for FailingStore {
    fn query(&self, _embedding: &Embedding, _k: usize) -> Result<Vec<Chunk>, RetrievalError> {
        Err(RetrievalError::Provider(ProviderError::Http {
            status: 503,
            message: "Service Unavailable".to_string(),
        }))
    }

    fn count(&self) -> Result<usize, RetrievalError> {
        Err(RetrievalError::Unavailable("down".to_string()))
    }
}

/// Answers with `reply`, or with the fallback sentence when the context is
/// empty, and records every user message it receives.
struct InstructedGenerator {
    reply: String,
    messages: Mutex<Vec<String>>,
}

impl InstructedGenerator {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            messages: Mutex::new(Vec::new()),
        })
    }

    fn last_message(&self) -> String {
        self.messages.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl Generator for InstructedGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        self.messages
            .lock()
            .unwrap()
            .push(request.user_message.to_string());

        assert!(request.system_instruction.contains(FALLBACK_ANSWER));
        if request.user_message.starts_with("Context: \n\n") {
            return Ok(FALLBACK_ANSWER.to_string());
        }
        Ok(self.reply.clone())
    }
}

fn answerer(
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
) -> QueryAnswerer {
    QueryAnswerer::builder()
        .embedder(embedder)
        .store(store)
        .generator(generator)
        .build()
        .unwrap()
}

#[test]
fn shared_source_is_reported_once() {
    let store = Arc::new(StubStore {
        chunks: vec![
            Chunk::with_source("site_name: the title of the site", "docs/configuration.md"),
            Chunk::with_source("Set it in mkdocs.yml", "docs/configuration.md"),
        ],
    });
    let generator = InstructedGenerator::new("Set `site_name` in mkdocs.yml.");
    let answerer = answerer(StubEmbedder::new(), store, generator);

    let record = answerer.answer("How do I change the site name?").unwrap();

    assert_eq!(record.answer, "Set `site_name` in mkdocs.yml.");
    assert_eq!(
        record.sources.into_iter().collect::<Vec<_>>(),
        vec!["docs/configuration.md"]
    );
}

#[test]
fn context_preserves_ranked_order() {
    let store = Arc::new(StubStore {
        chunks: vec![
            Chunk::with_source("nearest", "docs/a.md").at_distance(0.1),
            Chunk::with_source("middle", "docs/b.md").at_distance(0.2),
            Chunk::with_source("farthest", "docs/c.md").at_distance(0.3),
        ],
    });
    let generator = InstructedGenerator::new("ok");
    let answerer = answerer(StubEmbedder::new(), store, generator.clone());

    answerer.answer("order?").unwrap();

    let expected = ["nearest", "middle", "farthest"].join(CONTEXT_SEPARATOR);
    assert_eq!(
        generator.last_message(),
        format!("Context: {expected}\n\nQuestion: order?")
    );
}

#[test]
fn empty_retrieval_still_invokes_generator() {
    let store = Arc::new(StubStore { chunks: Vec::new() });
    let generator = InstructedGenerator::new("should not be used");
    let answerer = answerer(StubEmbedder::new(), store, generator.clone());

    let record = answerer.answer("How do I deploy to the moon?").unwrap();

    assert_eq!(record.answer, FALLBACK_ANSWER);
    assert!(record.sources.is_empty());
    assert_eq!(generator.messages.lock().unwrap().len(), 1);
}

#[test]
fn fallback_answer_shows_no_images() {
    let store = Arc::new(StubStore {
        chunks: vec![
            Chunk::with_source("screenshot of the nav bar", "docs/img/nav.png"),
            Chunk::with_source("theme overview", "docs/theme.md"),
        ],
    });
    let generator = InstructedGenerator::new(FALLBACK_ANSWER);
    let answerer = answerer(StubEmbedder::new(), store, generator);

    let record = answerer.answer("What is the meaning of life?").unwrap();

    assert!(record.is_fallback(FALLBACK_ANSWER));
    assert!(!record.sources.is_empty());
    assert!(illustrative_images(&record, answerer.config().fallback_answer()).is_empty());
}

#[test]
fn real_answer_shows_image_sources() {
    let store = Arc::new(StubStore {
        chunks: vec![
            Chunk::with_source("screenshot of the nav bar", "docs/img/nav.png"),
            Chunk::with_source("theme overview", "docs/theme.md"),
        ],
    });
    let generator = InstructedGenerator::new("The nav bar lists top-level pages.");
    let answerer = answerer(StubEmbedder::new(), store, generator);

    let record = answerer.answer("What does the nav bar show?").unwrap();

    assert_eq!(
        illustrative_images(&record, FALLBACK_ANSWER),
        vec!["docs/img/nav.png"]
    );
}

#[test]
fn blank_question_touches_no_collaborator() {
    let embedder = StubEmbedder::new();
    let answerer = answerer(
        embedder.clone(),
        Arc::new(FailingStore),
        InstructedGenerator::new("unused"),
    );

    let result = answerer.answer(" \t\n");

    assert!(matches!(result, Err(AnswerError::EmptyQuestion)));
    assert_eq!(*embedder.calls.lock().unwrap(), 0);
}

#[test]
fn store_failure_fails_the_whole_call() {
    let generator = InstructedGenerator::new("unused");
    let answerer = answerer(StubEmbedder::new(), Arc::new(FailingStore), generator.clone());

    let result = answerer.answer("How do I add a page?");

    assert!(matches!(result, Err(AnswerError::Retrieval(_))));
    assert!(generator.messages.lock().unwrap().is_empty());
}
