//! Error types for the chat client

use thiserror::Error;

/// Chat client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Please enter a prompt.")]
    EmptyPrompt,

    #[error("You're sending requests too fast. Please wait ~{retry_in_secs}s.")]
    Throttled { retry_in_secs: u64 },

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Rate limited by {model}: {message}")]
    RateLimited {
        model: String,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether this failure is a rate-limit/quota rejection eligible for
    /// the retry/fallback ladder.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Suggested retry delay, if the server provided one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    /// Render this error as a chunk the UI can display directly.
    ///
    /// The wrapper's contract is that every chunk is text, so all failure
    /// paths end in one of these strings rather than a propagated error.
    pub fn to_diagnostic(&self) -> String {
        match self {
            Self::EmptyPrompt | Self::Throttled { .. } => self.to_string(),
            Self::Timeout(_) => "The request timed out. Please try again.".to_string(),
            Self::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => {
                format!("The model is rate limited. Please retry in ~{secs}s.")
            }
            Self::RateLimited { .. } => {
                "The model is rate limited. Please try again later.".to_string()
            }
            Self::Upstream { status, message } if !message.is_empty() => {
                format!("Server error: {status} - {message}")
            }
            Self::Upstream { status, .. } => format!("Server error: {status}"),
            Self::Http(_) | Self::Json(_) => {
                "An error occurred while contacting the chat backend.".to_string()
            }
        }
    }
}

/// Result type alias for chat client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_classification() {
        let limited = ClientError::RateLimited {
            model: "gemini-1.5-flash".to_string(),
            message: "quota exceeded".to_string(),
            retry_after_secs: Some(30),
        };
        assert!(limited.is_rate_limit());
        assert_eq!(limited.retry_after_secs(), Some(30));

        let upstream = ClientError::Upstream {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!upstream.is_rate_limit());
        assert_eq!(upstream.retry_after_secs(), None);
    }

    #[test]
    fn diagnostics_are_human_readable() {
        assert_eq!(
            ClientError::EmptyPrompt.to_diagnostic(),
            "Please enter a prompt."
        );
        assert_eq!(
            ClientError::Throttled { retry_in_secs: 2 }.to_diagnostic(),
            "You're sending requests too fast. Please wait ~2s."
        );
        let limited = ClientError::RateLimited {
            model: "gemini-1.5-flash".to_string(),
            message: "quota".to_string(),
            retry_after_secs: Some(32),
        };
        assert!(limited.to_diagnostic().contains("~32s"));
    }
}
