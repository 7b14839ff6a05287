//! Gemini client against a local mock server.

use std::time::Duration;

use mkdocs_rag::{
    Embedder, EmbeddingError, GeminiClient, GeminiClientBuilder, GenerationError,
    GenerationRequest, Generator, ProviderError, RetryPolicy,
};
use mockito::{Matcher, Server};
use serde_json::json;

fn client(server: &Server) -> GeminiClient {
    GeminiClientBuilder::new()
        .api_key("test-key")
        .base_url(server.url())
        .retry_policy(RetryPolicy::none())
        .build()
        .unwrap()
}

fn request<'a>(user_message: &'a str) -> GenerationRequest<'a> {
    GenerationRequest {
        system_instruction: "Answer from the context only.",
        user_message,
        temperature: 0.3,
    }
}

#[test]
fn embed_posts_content_and_returns_values() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1beta/models/text-embedding-004:embedContent")
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "models/text-embedding-004",
            "content": { "parts": [{ "text": "How do I add a page?" }] }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"embedding": {"values": [0.25, -0.5, 1.0]}}"#)
        .create();

    let embedding = client(&server).embed("How do I add a page?").unwrap();

    mock.assert();
    assert_eq!(embedding.as_slice(), &[0.25, -0.5, 1.0]);
}

#[test]
fn embed_without_values_is_empty_error() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1beta/models/text-embedding-004:embedContent")
        .with_status(200)
        .with_body(r#"{"embedding": {"values": []}}"#)
        .create();

    let err = client(&server).embed("anything").unwrap_err();
    assert!(matches!(err, EmbeddingError::Empty));
}

#[test]
fn generate_sends_instruction_and_temperature() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "systemInstruction": { "parts": [{ "text": "Answer from the context only." }] },
            "contents": [{ "role": "user", "parts": [{ "text": "Context: c\n\nQuestion: q" }] }],
            "generationConfig": { "temperature": 0.3 }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Set " }, { "text": "`site_name`." }] }
                }]
            })
            .to_string(),
        )
        .create();

    let answer = client(&server)
        .generate(&request("Context: c\n\nQuestion: q"))
        .unwrap();

    mock.assert();
    assert_eq!(answer, "Set `site_name`.");
}

#[test]
fn blocked_prompt_reports_reason() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
        .with_status(200)
        .with_body(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#)
        .create();

    let err = client(&server).generate(&request("q")).unwrap_err();
    assert!(matches!(err, GenerationError::Blocked { ref reason } if reason == "SAFETY"));
}

#[test]
fn invalid_key_surfaces_api_message() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
        .with_status(400)
        .with_body(r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#)
        .create();

    let err = client(&server).generate(&request("q")).unwrap_err();
    match err {
        GenerationError::Provider(ProviderError::Http { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn server_errors_are_retried() {
    let mut server = Server::new();
    let failing = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
        .with_status(503)
        .with_body(r#"{"error": {"message": "overloaded"}}"#)
        .expect(2)
        .create();

    let client = GeminiClientBuilder::new()
        .api_key("test-key")
        .base_url(server.url())
        .retry_policy(RetryPolicy::with_delays(vec![Duration::from_millis(1)]))
        .build()
        .unwrap();

    let err = client.generate(&request("q")).unwrap_err();

    failing.assert();
    assert!(matches!(
        err,
        GenerationError::Provider(ProviderError::Http { status: 503, .. })
    ));
}

#[test]
fn client_errors_are_not_retried() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1beta/models/text-embedding-004:embedContent")
        .with_status(404)
        .with_body(r#"{"error": {"message": "model not found"}}"#)
        .expect(1)
        .create();

    let client = GeminiClientBuilder::new()
        .api_key("test-key")
        .base_url(server.url())
        .retry_policy(RetryPolicy::with_delays(vec![Duration::from_millis(1)]))
        .build()
        .unwrap();

    assert!(client.embed("q").is_err());
    mock.assert();
}

#[test]
fn model_info_reads_display_name() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/v1beta/models/gemini-2.0-flash")
        .match_header("x-goog-api-key", "test-key")
        .with_status(200)
        .with_body(r#"{"name": "models/gemini-2.0-flash", "displayName": "Gemini 2.0 Flash", "inputTokenLimit": 1048576}"#)
        .create();

    let info = client(&server).model_info("gemini-2.0-flash").unwrap();
    assert_eq!(info.display_name.as_deref(), Some("Gemini 2.0 Flash"));
    assert_eq!(info.input_token_limit, Some(1048576));
}

/// Calls the real Gemini API. Skipped unless `GOOGLE_API_KEY` is set.
#[test]
fn embed_with_real_gemini_api() {
    let Some(key) = std::env::var("GOOGLE_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
    else {
        println!("Skipping: GOOGLE_API_KEY is not set");
        return;
    };

    let client = GeminiClientBuilder::new().api_key(key).build().unwrap();
    let embedding = client.embed("MkDocs builds static sites.").unwrap();
    assert!(!embedding.is_empty());
}
