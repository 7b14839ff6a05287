//! Interactive chat session over a `QueryAnswerer`.
//!
//! Keeps the transcript in memory for the lifetime of the session. A failing
//! question turns into a "service unavailable" reply; the session itself
//! keeps going.

use serde::Serialize;
use time::OffsetDateTime;

use crate::answerer::QueryAnswerer;
use crate::display::illustrative_images;

/// Reply shown when any collaborator fails.
pub const SERVICE_UNAVAILABLE: &str =
    "The documentation service is currently unavailable. Please try again later.";

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the transcript.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Image sources shown with an assistant answer
    pub images: Vec<String>,
    /// All sources the answer was grounded on
    pub sources: Vec<String>,
    pub created_at: OffsetDateTime,
    /// True if this reply stands in for a failed question
    pub failed: bool,
}

impl ChatMessage {
    fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            images: Vec::new(),
            sources: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
            failed: false,
        }
    }

    fn assistant(content: String, sources: Vec<String>, images: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            images,
            sources,
            created_at: OffsetDateTime::now_utc(),
            failed: false,
        }
    }

    fn unavailable() -> Self {
        Self {
            failed: true,
            ..Self::assistant(SERVICE_UNAVAILABLE.to_string(), Vec::new(), Vec::new())
        }
    }
}

/// A chat session holding its transcript.
pub struct ChatSession<'a> {
    answerer: &'a QueryAnswerer,
    messages: Vec<ChatMessage>,
}

impl<'a> ChatSession<'a> {
    /// Starts an empty session.
    pub fn new(answerer: &'a QueryAnswerer) -> Self {
        Self {
            answerer,
            messages: Vec::new(),
        }
    }

    /// Returns the transcript, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Asks a question and returns the assistant's reply.
    ///
    /// Blank prompts are ignored and return `None`.
    pub fn ask(&mut self, prompt: &str) -> Option<&ChatMessage> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }

        self.messages.push(ChatMessage::user(prompt));

        let reply = match self.answerer.answer(prompt) {
            Ok(record) => {
                let fallback = self.answerer.config().fallback_answer();
                let images = illustrative_images(&record, fallback)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let sources = record.sources.into_iter().collect();
                ChatMessage::assistant(record.answer, sources, images)
            }
            Err(e) => {
                tracing::error!(error = %e, "question failed");
                ChatMessage::unavailable()
            }
        };

        self.messages.push(reply);
        self.messages.last()
    }
}
