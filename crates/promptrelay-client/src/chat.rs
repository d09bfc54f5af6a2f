//! Chat client wrapper: validation, throttle, timeout, quota fallback

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::{sleep, timeout};

use crate::cache::ResponseCache;
use crate::config::{ClientConfig, RETRY_DELAY_CEILING};
use crate::error::{ClientError, Result};
use crate::throttle::Throttle;
use crate::transport::{ChatTransport, TextStream};
use crate::upstream::GeminiClient;

/// Stream of displayable text chunks.
///
/// Unlike [`TextStream`], items are plain strings: every failure has
/// already been converted into a human-readable terminal chunk.
pub type ChunkStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// The client-side chat pipeline.
///
/// Owns its throttle and cache as fields rather than process-wide state,
/// so independent instances (and parallel tests) do not interfere.
pub struct ChatClient {
    config: ClientConfig,
    throttle: Arc<Throttle>,
    cache: Arc<ResponseCache>,
    primary: Arc<dyn ChatTransport>,
    fallback: Option<Arc<dyn ChatTransport>>,
}

impl ChatClient {
    pub fn new(config: ClientConfig, primary: Arc<dyn ChatTransport>) -> Self {
        let throttle = Arc::new(Throttle::new(config.throttle_interval));
        Self {
            config,
            throttle,
            cache: Arc::new(ResponseCache::new()),
            primary,
            fallback: None,
        }
    }

    /// Client that dispatches through the relay endpoint at `base_url`.
    pub fn for_relay(config: ClientConfig, base_url: impl Into<String>) -> Self {
        let transport = crate::transport::RelayTransport::new(base_url, &config.chat_path)
            .with_model_label(config.model.clone());
        Self::new(config, Arc::new(transport))
    }

    /// Client that calls the upstream model API directly, with the
    /// configured fallback model wired in if one is set.
    pub fn direct(config: ClientConfig, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let generation = crate::upstream::GenerationConfig {
            max_output_tokens: config.max_output_tokens,
            ..Default::default()
        };
        let primary = GeminiClient::new(api_key.clone())
            .with_model(config.model.clone())
            .with_generation(generation.clone());
        let fallback = config.fallback_model.clone().map(|model| {
            Arc::new(
                GeminiClient::new(api_key)
                    .with_model(model)
                    .with_generation(generation),
            ) as Arc<dyn ChatTransport>
        });

        let mut client = Self::new(config, Arc::new(primary));
        client.fallback = fallback;
        client
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ChatTransport>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate and admit a dispatch, returning the chunk stream.
    ///
    /// `Err` means the prompt was rejected before anything was sent:
    /// empty prompt, or throttle cooldown (which leaves the throttle
    /// timestamp untouched). Callers that track history can rely on
    /// `Ok` meaning the prompt is actually being dispatched.
    pub fn begin_stream(&self, prompt: &str) -> Result<ChunkStream> {
        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(ClientError::EmptyPrompt);
        }
        self.throttle
            .check()
            .map_err(|retry_in_secs| ClientError::Throttled { retry_in_secs })?;

        let primary = self.primary.clone();
        let fallback = self.fallback.clone();
        let request_timeout = self.config.request_timeout;
        let auto_retry = self.config.auto_retry_on_quota;

        Ok(Box::pin(async_stream::stream! {
            let opened = open_with_quota_policy(
                &primary,
                fallback.as_deref(),
                &prompt,
                request_timeout,
                auto_retry,
            )
            .await;

            let mut stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(error = %e, "chat dispatch failed");
                    yield e.to_diagnostic();
                    return;
                }
            };

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(text) => yield text,
                    Err(e) => {
                        tracing::warn!(error = %e, "chat stream interrupted");
                        yield e.to_diagnostic();
                        return;
                    }
                }
            }
        }))
    }

    /// Stream a response for `prompt` as displayable text chunks.
    ///
    /// Every short-circuit (empty prompt, throttle rejection, timeout,
    /// quota exhaustion, transport failure) terminates the stream with a
    /// single diagnostic chunk instead of an error.
    pub fn stream_chat(&self, prompt: &str) -> ChunkStream {
        match self.begin_stream(prompt) {
            Ok(stream) => stream,
            Err(e) => Box::pin(futures::stream::once(async move { e.to_diagnostic() })),
        }
    }

    /// Non-streaming variant: returns the full response (or a diagnostic)
    /// as one string, memoizing successes by (model, prompt).
    pub async fn run_chat(&self, prompt: &str) -> String {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return ClientError::EmptyPrompt.to_diagnostic();
        }

        // A cache hit is not a dispatch: it neither consults nor advances
        // the throttle window.
        if let Some(cached) = self.cache.get(self.primary.model(), prompt) {
            tracing::debug!(model = self.primary.model(), "serving cached response");
            return cached;
        }

        if let Err(retry_in_secs) = self.throttle.check() {
            return ClientError::Throttled { retry_in_secs }.to_diagnostic();
        }

        let fetched = fetch_with_quota_policy(
            &self.primary,
            self.fallback.as_deref(),
            prompt,
            self.config.request_timeout,
            self.config.auto_retry_on_quota,
        )
        .await;

        match fetched {
            Ok((text, model)) => {
                self.cache.insert(&model, prompt, text.clone());
                text
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                e.to_diagnostic()
            }
        }
    }
}

async fn dispatch_stream(
    transport: &dyn ChatTransport,
    prompt: &str,
    request_timeout: Duration,
) -> Result<TextStream> {
    match timeout(request_timeout, transport.fetch_stream(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(request_timeout.as_millis() as u64)),
    }
}

async fn dispatch_fetch(
    transport: &dyn ChatTransport,
    prompt: &str,
    request_timeout: Duration,
) -> Result<String> {
    match timeout(request_timeout, transport.fetch(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(request_timeout.as_millis() as u64)),
    }
}

/// Whether a quota rejection qualifies for the single same-model retry.
fn retry_delay(error: &ClientError, auto_retry: bool) -> Option<Duration> {
    if !auto_retry {
        return None;
    }
    let secs = error.retry_after_secs()?;
    let delay = Duration::from_secs(secs);
    (delay <= RETRY_DELAY_CEILING).then_some(delay)
}

/// Open a stream on the primary, applying the quota ladder: one optional
/// same-model retry after the hinted delay, then one fallback attempt.
/// The original rate-limit error is preserved for the final diagnostic.
async fn open_with_quota_policy(
    primary: &Arc<dyn ChatTransport>,
    fallback: Option<&dyn ChatTransport>,
    prompt: &str,
    request_timeout: Duration,
    auto_retry: bool,
) -> Result<TextStream> {
    let first = match dispatch_stream(primary.as_ref(), prompt, request_timeout).await {
        Ok(stream) => return Ok(stream),
        Err(e) if e.is_rate_limit() => e,
        Err(e) => return Err(e),
    };

    if let Some(delay) = retry_delay(&first, auto_retry) {
        tracing::debug!(
            model = primary.model(),
            delay_secs = delay.as_secs(),
            "rate limited, retrying same model"
        );
        sleep(delay).await;
        match dispatch_stream(primary.as_ref(), prompt, request_timeout).await {
            Ok(stream) => return Ok(stream),
            Err(e) => tracing::warn!(error = %e, "retry after rate limit failed"),
        }
    }

    if let Some(fallback) = fallback {
        tracing::debug!(model = fallback.model(), "trying fallback model");
        match dispatch_stream(fallback, prompt, request_timeout).await {
            Ok(stream) => return Ok(stream),
            Err(e) => tracing::warn!(error = %e, "fallback model failed"),
        }
    }

    Err(first)
}

/// Non-streaming counterpart of [`open_with_quota_policy`]; also reports
/// which model produced the response so it can be cached under that key.
async fn fetch_with_quota_policy(
    primary: &Arc<dyn ChatTransport>,
    fallback: Option<&dyn ChatTransport>,
    prompt: &str,
    request_timeout: Duration,
    auto_retry: bool,
) -> Result<(String, String)> {
    let first = match dispatch_fetch(primary.as_ref(), prompt, request_timeout).await {
        Ok(text) => return Ok((text, primary.model().to_string())),
        Err(e) if e.is_rate_limit() => e,
        Err(e) => return Err(e),
    };

    if let Some(delay) = retry_delay(&first, auto_retry) {
        sleep(delay).await;
        match dispatch_fetch(primary.as_ref(), prompt, request_timeout).await {
            Ok(text) => return Ok((text, primary.model().to_string())),
            Err(e) => tracing::warn!(error = %e, "retry after rate limit failed"),
        }
    }

    if let Some(fallback) = fallback {
        match dispatch_fetch(fallback, prompt, request_timeout).await {
            Ok(text) => return Ok((text, fallback.model().to_string())),
            Err(e) => tracing::warn!(error = %e, "fallback model failed"),
        }
    }

    Err(first)
}

/// Drain a chunk stream into the full response text.
pub async fn collect_chunks(mut stream: ChunkStream) -> String {
    let mut out = String::new();
    while let Some(chunk) = stream.next().await {
        out.push_str(&chunk);
    }
    out
}
