use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::Chunk;

/// Distinct `source` identifiers of the chunks an answer was grounded on.
pub type SourceSet = BTreeSet<String>;

/// The outcome of answering one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// The generated answer text
    pub answer: String,
    /// Distinct sources of the retrieved context
    pub sources: SourceSet,
}

impl AnswerRecord {
    /// Creates a new record.
    pub fn new(answer: impl Into<String>, sources: SourceSet) -> Self {
        Self {
            answer: answer.into(),
            sources,
        }
    }

    /// Returns true if the answer is exactly the given fallback sentence.
    ///
    /// Surrounding whitespace is ignored; anything else (paraphrases, extra
    /// sentences) is treated as a real answer.
    pub fn is_fallback(&self, fallback: &str) -> bool {
        self.answer.trim() == fallback.trim()
    }
}

/// Collects the distinct sources of a retrieval result.
///
/// Chunks without a string `source` contribute nothing.
pub fn collect_sources(chunks: &[Chunk]) -> SourceSet {
    chunks
        .iter()
        .filter_map(Chunk::source)
        .map(str::to_string)
        .collect()
}
