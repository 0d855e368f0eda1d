//! Error type for the provider stream adapter.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("rate limited{}", .retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("stream closed by provider: {0}")]
    Stream(String),

    #[error("stream idle for longer than the configured timeout")]
    IdleTimeout,
}

impl ProviderError {
    /// HTTP 429 and 5xx are transient; everything else (4xx other than 429,
    /// malformed bodies, local parse failures) is not worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            ProviderError::Transport(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
