//! Transport seam between the chat wrapper and whatever produces text

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;

use crate::error::{ClientError, Result};

/// Ordered, incrementally produced response text.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A source of generated text for a prompt.
///
/// Implemented by the relay consumer, the direct upstream client, and the
/// scripted mock. The wrapper owns exactly which implementation it talks
/// to; there is no process-wide client.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Model identifier requests are attributed to (used as a cache key).
    fn model(&self) -> &str;

    /// Fetch the complete response body in one piece.
    async fn fetch(&self, prompt: &str) -> Result<String>;

    /// Open an incremental response.
    async fn fetch_stream(&self, prompt: &str) -> Result<TextStream>;
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    prompt: &'a str,
}

/// Transport that talks to the relay endpoint, which holds the API key.
pub struct RelayTransport {
    client: Client,
    url: String,
    model: String,
}

impl RelayTransport {
    /// `base_url` is the relay origin, `chat_path` the configured route.
    pub fn new(base_url: impl Into<String>, chat_path: &str) -> Self {
        let base = base_url.into();
        Self {
            client: Client::new(),
            url: format!("{}{}", base.trim_end_matches('/'), chat_path),
            model: "relay".to_string(),
        }
    }

    /// Label used for cache attribution, defaults to "relay".
    pub fn with_model_label(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn open(&self, prompt: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.url)
            .json(&RelayRequest { prompt })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for RelayTransport {
    fn model(&self) -> &str {
        &self.model
    }

    async fn fetch(&self, prompt: &str) -> Result<String> {
        let response = self.open(prompt).await?;
        Ok(response.text().await?)
    }

    async fn fetch_stream(&self, prompt: &str) -> Result<TextStream> {
        let response = self.open(prompt).await?;
        Ok(decode_body_stream(response))
    }
}

/// Decode a chunked plain-text body into string chunks as bytes arrive.
///
/// A multi-byte code point may be split across network chunks, so bytes
/// that do not yet form valid UTF-8 are held back until the next chunk.
fn decode_body_stream(response: reqwest::Response) -> TextStream {
    let mut byte_stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = byte_stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(ClientError::Http(e));
                    return;
                }
            };
            pending.extend_from_slice(&bytes);

            let decoded = match std::str::from_utf8(&pending) {
                Ok(text) if text.is_empty() => None,
                Ok(text) => Some((text.to_string(), pending.len())),
                Err(e) => {
                    let valid = e.valid_up_to();
                    match e.error_len() {
                        // Invalid sequence: replace it and move on.
                        Some(bad) => {
                            let mut text =
                                String::from_utf8_lossy(&pending[..valid]).into_owned();
                            text.push('\u{FFFD}');
                            Some((text, valid + bad))
                        }
                        // Incomplete tail: hold it for the next chunk.
                        None if valid > 0 => Some((
                            String::from_utf8_lossy(&pending[..valid]).into_owned(),
                            valid,
                        )),
                        None => None,
                    }
                }
            };

            if let Some((text, consumed)) = decoded {
                pending.drain(..consumed);
                yield Ok(text);
            }
        }

        // Trailing bytes that never completed a code point.
        if !pending.is_empty() {
            yield Ok(String::from_utf8_lossy(&pending).into_owned());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_returns_relay_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(serde_json::json!({"prompt": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello there"))
            .mount(&server)
            .await;

        let transport = RelayTransport::new(server.uri(), "/api/chat");
        let body = transport.fetch("hi").await.unwrap();
        assert_eq!(body, "hello there");
    }

    #[tokio::test]
    async fn fetch_stream_concatenates_to_full_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("streamed response"))
            .mount(&server)
            .await;

        let transport = RelayTransport::new(server.uri(), "/api/chat");
        let stream = transport.fetch_stream("hi").await.unwrap();
        let chunks: Vec<String> = stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), "streamed response");
    }

    #[tokio::test]
    async fn non_success_status_surfaces_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"Prompt is required"}"#),
            )
            .mount(&server)
            .await;

        let transport = RelayTransport::new(server.uri(), "/api/chat");
        let err = transport.fetch("").await.unwrap_err();
        match err {
            ClientError::Upstream { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("Prompt is required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
