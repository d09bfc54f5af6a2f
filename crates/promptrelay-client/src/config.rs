//! Client configuration

use std::env;
use std::time::Duration;

/// Ceiling on server-suggested retry delays the client will honor.
pub const RETRY_DELAY_CEILING: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hard deadline for opening a response.
    pub request_timeout: Duration,
    /// Minimum interval between dispatches.
    pub throttle_interval: Duration,
    /// Path of the relay chat route.
    pub chat_path: String,
    /// Cap on generated output tokens.
    pub max_output_tokens: u32,
    /// Model requested from the upstream API.
    pub model: String,
    /// Model tried once when the primary is rate limited.
    pub fallback_model: Option<String>,
    /// Retry the same model once on quota errors before falling back.
    pub auto_retry_on_quota: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(default_timeout_ms()),
            throttle_interval: Duration::from_millis(default_throttle_ms()),
            chat_path: default_chat_path(),
            max_output_tokens: default_max_output_tokens(),
            model: default_model(),
            fallback_model: None,
            auto_retry_on_quota: false,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let request_timeout = env::var("PROMPTRELAY_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(default_timeout_ms()));
        let throttle_interval = env::var("PROMPTRELAY_THROTTLE_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(default_throttle_ms()));
        let chat_path =
            env::var("PROMPTRELAY_CHAT_PATH").unwrap_or_else(|_| default_chat_path());
        let max_output_tokens = env::var("PROMPTRELAY_MAX_OUTPUT_TOKENS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or_else(default_max_output_tokens);
        let model = env::var("PROMPTRELAY_MODEL").unwrap_or_else(|_| default_model());
        let fallback_model = env::var("PROMPTRELAY_FALLBACK_MODEL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let auto_retry_on_quota = env::var("PROMPTRELAY_AUTO_RETRY")
            .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            request_timeout,
            throttle_interval,
            chat_path,
            max_output_tokens,
            model,
            fallback_model,
            auto_retry_on_quota,
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_throttle_ms() -> u64 {
    1_000
}

fn default_chat_path() -> String {
    "/api/chat".to_string()
}

fn default_max_output_tokens() -> u32 {
    512
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.throttle_interval, Duration::from_secs(1));
        assert_eq!(config.chat_path, "/api/chat");
        assert_eq!(config.max_output_tokens, 512);
        assert_eq!(config.model, "gemini-1.5-flash");
        assert!(config.fallback_model.is_none());
        assert!(!config.auto_retry_on_quota);
    }
}
