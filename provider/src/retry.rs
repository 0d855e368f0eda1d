//! Exponential backoff for retrying transient provider errors.
//!
//! Retries cap at 8 attempts with a `2000 * 2^(n-1)` ms base delay plus
//! 20% jitter; a `Retry-After` header on the error takes precedence over
//! the computed delay.

use std::time::Duration;

use rand::Rng;

use crate::error::ProviderError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub jitter_ratio: f64,
    pub respect_retry_after: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_backoff: Duration::from_millis(2000),
            backoff_multiplier: 2.0,
            jitter_ratio: 0.2,
            respect_retry_after: true,
        }
    }
}

impl RetryConfig {
    fn calculate_delay(&self, attempt: u32, error: &ProviderError) -> Duration {
        if self.respect_retry_after {
            if let Some(delay) = error.retry_after() {
                return delay;
            }
        }

        let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32 - 1);
        let jitter = base * self.jitter_ratio * rand::rng().random::<f64>();
        Duration::from_secs_f64(base + jitter)
    }
}

/// Retry `operation` according to `config`, sleeping between attempts.
/// Returns the last error, wrapped as `RetriesExhausted`, once
/// `max_attempts` is reached or the error is not retryable.
pub async fn retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt >= config.max_attempts {
                    return Err(ProviderError::RetriesExhausted {
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }
                let delay = config.calculate_delay(attempt, &err);
                tracing::debug!(attempt, delay = ?delay, error = %err, "retrying provider request");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    #[test]
    fn calculate_delay_doubles_per_attempt_before_jitter() {
        let config = RetryConfig {
            jitter_ratio: 0.0,
            ..RetryConfig::default()
        };
        let err = ProviderError::Http { status: 500, body: String::new() };
        assert_eq!(config.calculate_delay(1, &err), Duration::from_millis(2000));
        assert_eq!(config.calculate_delay(2, &err), Duration::from_millis(4000));
        assert_eq!(config.calculate_delay(3, &err), Duration::from_millis(8000));
    }

    #[test]
    fn calculate_delay_honors_retry_after() {
        let config = RetryConfig::default();
        let err = ProviderError::RateLimited {
            retry_after: Some(Duration::from_millis(500)),
        };
        assert_eq!(config.calculate_delay(4, &err), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn retry_stops_on_non_retryable_error() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), ProviderError> = retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Parse("bad json".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_exhausts_after_max_attempts() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            ..RetryConfig::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), ProviderError> = retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Http { status: 503, body: String::new() }) }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::RetriesExhausted { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failure() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            ..RetryConfig::default()
        };
        let calls = AtomicU32::new(0);
        let result = retry(&config, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(ProviderError::Http { status: 429, body: String::new() })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.expect("ok"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
