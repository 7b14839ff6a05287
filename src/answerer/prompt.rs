//! Prompt construction for grounded answering.

use crate::models::Chunk;

/// Sentence the model must reply with when the context lacks the answer.
///
/// Hosts compare answers against this exact text to decide whether any
/// retrieved evidence should be displayed.
pub const FALLBACK_ANSWER: &str =
    "I cannot find information about this in the MkDocs documentation.";

/// Separator placed between retrieved chunks in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// System instruction template; `{fallback}` is replaced with the fallback sentence.
const SYSTEM_INSTRUCTION_TEMPLATE: &str = r#"You are a specialized Technical Support Assistant for MkDocs.
STRICT RULES:
1. Answer using ONLY the provided context.
2. If the answer is NOT in the context, say: "{fallback}"
3. Keep answers technical and concise."#;

/// Builds the system instruction around the given fallback sentence.
pub fn system_instruction(fallback: &str) -> String {
    SYSTEM_INSTRUCTION_TEMPLATE.replace("{fallback}", fallback)
}

/// Joins chunk texts nearest-first with a horizontal rule between them.
pub fn build_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Builds the user turn from the context block and the question.
pub fn user_message(context: &str, question: &str) -> String {
    format!("Context: {context}\n\nQuestion: {question}")
}
