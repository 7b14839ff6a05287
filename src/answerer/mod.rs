//! Question answering grounded in retrieved documentation.
//!
//! This module provides the `QueryAnswerer` struct which embeds a question,
//! retrieves the nearest documentation chunks and asks a language model to
//! answer strictly from them.

mod prompt;
mod query_answerer;

pub use prompt::{
    CONTEXT_SEPARATOR, FALLBACK_ANSWER, build_context, system_instruction, user_message,
};
pub use query_answerer::{
    AnswererConfig, DEFAULT_TEMPERATURE, DEFAULT_TOP_K, QueryAnswerer, QueryAnswererBuilder,
};
