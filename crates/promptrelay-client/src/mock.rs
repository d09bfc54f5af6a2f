//! Deterministic scripted transport for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::{ClientError, Result};
use crate::transport::{ChatTransport, TextStream};

/// Scripted outcome for one dispatch.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Deliver these chunks (concatenated for non-streaming fetches).
    Chunks(Vec<String>),
    /// Fail with a rate-limit/quota error.
    RateLimited { retry_after_secs: Option<u64> },
    /// Fail with an upstream HTTP-style error.
    Upstream { status: u16, message: String },
}

/// One scripted step with an optional artificial delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Chunks(vec![content.into()]),
        }
    }

    pub fn chunks(chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Chunks(chunks.into_iter().map(Into::into).collect()),
        }
    }

    pub fn rate_limited(retry_after_secs: Option<u64>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::RateLimited { retry_after_secs },
        }
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Upstream {
                status,
                message: message.into(),
            },
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Scripted [`ChatTransport`] that records every prompt it receives.
///
/// An exhausted script fails the dispatch, so tests notice unexpected
/// extra calls.
#[derive(Debug, Clone)]
pub struct MockTransport {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        let mock = Self::new(model);
        mock.script.lock().extend(steps);
        mock
    }

    pub fn push_step(&self, step: MockStep) {
        self.script.lock().push_back(step);
    }

    /// Prompts received so far, in dispatch order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    async fn next_step(&self, prompt: &str) -> Result<MockStep> {
        self.prompts.lock().push(prompt.to_string());
        let step = self.script.lock().pop_front();
        let Some(step) = step else {
            return Err(ClientError::Upstream {
                status: 500,
                message: "mock script exhausted".to_string(),
            });
        };
        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }
        Ok(step)
    }

    fn step_error(&self, kind: MockStepKind) -> ClientError {
        match kind {
            MockStepKind::RateLimited { retry_after_secs } => ClientError::RateLimited {
                model: self.model.clone(),
                message: "mock quota exceeded".to_string(),
                retry_after_secs,
            },
            MockStepKind::Upstream { status, message } => {
                ClientError::Upstream { status, message }
            }
            MockStepKind::Chunks(_) => unreachable!("chunks are not an error"),
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    fn model(&self) -> &str {
        &self.model
    }

    async fn fetch(&self, prompt: &str) -> Result<String> {
        let step = self.next_step(prompt).await?;
        match step.kind {
            MockStepKind::Chunks(chunks) => Ok(chunks.concat()),
            other => Err(self.step_error(other)),
        }
    }

    async fn fetch_stream(&self, prompt: &str) -> Result<TextStream> {
        let step = self.next_step(prompt).await?;
        match step.kind {
            MockStepKind::Chunks(chunks) => {
                Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
            }
            other => Err(self.step_error(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn scripted_chunks_round_trip() {
        let mock = MockTransport::from_steps(
            "mock-model",
            vec![MockStep::chunks(["a", "b"]), MockStep::text("ab")],
        );

        let stream = mock.fetch_stream("p1").await.unwrap();
        let chunks: Vec<String> = stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), "ab");

        assert_eq!(mock.fetch("p2").await.unwrap(), "ab");
        assert_eq!(mock.prompts(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    async fn exhausted_script_is_an_error() {
        let mock = MockTransport::new("mock-model");
        assert!(mock.fetch("p").await.is_err());
    }
}
