//! Google Generative Language API client

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::transport::{ChatTransport, TextStream};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Generation parameters sent with every request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_p: 1.0,
            top_k: 40,
            max_output_tokens: 512,
        }
    }
}

/// Client for the Gemini generate-content API.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gemini-1.5-flash".to_string(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Override the API origin, used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.base_url, self.model, operation
        )
    }

    fn request_body(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: self.generation.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Pull a suggested retry delay out of a quota error body.
///
/// The API embeds it in prose ("Please retry in 32.5s.") or as a
/// structured `retryDelay: "32s"` detail; either form is accepted.
fn parse_retry_delay(message: &str) -> Option<u64> {
    let patterns = [
        r"(?i)retry in\s+([0-9]+(?:\.[0-9]+)?)\s*s",
        r#"(?i)retryDelay[^0-9]*([0-9]+(?:\.[0-9]+)?)s"#,
    ];
    for pattern in patterns {
        let re = Regex::new(pattern).ok()?;
        if let Some(captures) = re.captures(message)
            && let Some(value) = captures.get(1)
            && let Ok(secs) = value.as_str().parse::<f64>()
        {
            return Some(secs.ceil() as u64);
        }
    }
    None
}

fn parse_retry_after_header(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

async fn response_to_error(response: Response, model: &str) -> ClientError {
    let status = response.status();
    let header_delay = parse_retry_after_header(&response);
    let body = response.text().await.unwrap_or_default();

    // Truncate to avoid echoing large or sensitive upstream bodies.
    const MAX_ERROR_BODY: usize = 512;
    let message = if body.len() > MAX_ERROR_BODY {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i <= MAX_ERROR_BODY)
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0);
        format!("{}... [truncated]", &body[..cut])
    } else {
        body
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = header_delay.or_else(|| parse_retry_delay(&message));
        return ClientError::RateLimited {
            model: model.to_string(),
            message,
            retry_after_secs,
        };
    }

    ClientError::Upstream {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl ChatTransport for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn fetch(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("generateContent"))
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_to_error(response, &self.model).await);
        }

        let data: GenerateResponse = response.json().await?;
        Ok(data.text())
    }

    async fn fetch_stream(&self, prompt: &str) -> Result<TextStream> {
        let response = self
            .client
            .post(self.endpoint("streamGenerateContent"))
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&self.request_body(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_to_error(response, &self.model).await);
        }

        let mut byte_stream = response.bytes_stream();

        Ok(Box::pin(async_stream::stream! {
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(ClientError::Http(e));
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete SSE events from the buffer.
                while let Some(pos) = buffer.find("\n\n") {
                    let event = buffer[..pos].to_string();
                    buffer = buffer[pos + 2..].to_string();

                    for line in event.lines() {
                        let Some(data) = line.strip_prefix("data: ") else {
                            continue;
                        };
                        if data.trim().is_empty() || data.trim() == "[DONE]" {
                            continue;
                        }

                        let parsed: GenerateResponse = match serde_json::from_str(data) {
                            Ok(parsed) => parsed,
                            Err(e) => {
                                tracing::debug!(error = %e, "skipping unparsable stream event");
                                continue;
                            }
                        };

                        let text = parsed.text();
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                }
            }
        }))
    }
}
