//! End-to-end chat client tests against a mocked HTTP backend.

use std::sync::Arc;
use std::time::Duration;

use promptrelay_client::{
    ChatClient, ChatTransport, ClientConfig, GeminiClient, collect_chunks,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn no_throttle() -> ClientConfig {
    ClientConfig {
        throttle_interval: Duration::ZERO,
        ..ClientConfig::default()
    }
}

fn candidate_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] }
        }]
    })
}

#[tokio::test]
async fn relay_client_streams_and_round_trips_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("The capital of France is Paris."))
        .mount(&server)
        .await;

    let client = ChatClient::for_relay(no_throttle(), server.uri());

    let streamed = collect_chunks(client.stream_chat("capital of France?")).await;
    assert_eq!(streamed, "The capital of France is Paris.");
}

#[tokio::test]
async fn relay_error_body_is_surfaced_as_a_diagnostic_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string(r#"{"error":"Internal server error"}"#),
        )
        .mount(&server)
        .await;

    let client = ChatClient::for_relay(no_throttle(), server.uri());

    let text = collect_chunks(client.stream_chat("hello")).await;
    assert!(text.starts_with("Server error: 500"));
    assert!(text.contains("Internal server error"));
}

#[tokio::test]
async fn rate_limited_primary_model_falls_back_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:streamGenerateContent"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("Quota exceeded. Please retry in 30s."),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "data: {}\n\n",
            candidate_body("answer from fallback")
        )))
        .mount(&server)
        .await;

    let primary = GeminiClient::new("test-key")
        .with_model("gemini-1.5-flash")
        .with_base_url(server.uri());
    let fallback = GeminiClient::new("test-key")
        .with_model("gemini-1.5-pro")
        .with_base_url(server.uri());

    let client = ChatClient::new(no_throttle(), Arc::new(primary))
        .with_fallback(Arc::new(fallback) as Arc<dyn ChatTransport>);

    let text = collect_chunks(client.stream_chat("hello")).await;
    assert_eq!(text, "answer from fallback");
}

#[tokio::test]
async fn streamed_and_full_fetch_agree_for_the_same_prompt() {
    let server = MockServer::start().await;
    let sse = format!(
        "data: {}\n\ndata: {}\n\n",
        candidate_body("one "),
        candidate_body("two")
    );
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("one two")))
        .mount(&server)
        .await;

    let upstream = GeminiClient::new("test-key").with_base_url(server.uri());
    let streamed: Vec<String> = {
        use futures::TryStreamExt;
        upstream
            .fetch_stream("count")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    };
    let full = upstream.fetch("count").await.unwrap();

    assert_eq!(streamed.concat(), full);
}
