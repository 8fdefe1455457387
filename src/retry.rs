//! Exponential backoff for buffered requests.
//!
//! Streaming requests are never retried.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::client::ClientError;
use crate::options::ClientConfig;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; each further retry doubles it
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&ClientConfig> for RetryConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        }
    }
}

impl RetryConfig {
    /// Wait before retry number `retry`, counting from zero: `base · 2^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Run `operation` until it succeeds, fails for good, or the budget runs out.
///
/// Errors for which [`ClientError::is_retryable`] is false are returned as
/// they are. A retryable error left over once the budget is spent comes back
/// wrapped in [`ClientError::RetriesExhausted`].
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut retry = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && retry < config.max_retries => {
                let delay = config.delay_for(retry);
                warn!(
                    attempt = retry + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after error: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(e) if e.is_retryable() => {
                return Err(ClientError::RetriesExhausted {
                    attempts: retry + 1,
                    source: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn server_error() -> ClientError {
        ClientError::Http {
            status: 500,
            body: "internal".to_string(),
        }
    }

    #[test]
    fn test_delay_schedule() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_secs(1));
        assert_eq!(config.delay_for(1), Duration::from_secs(2));
        assert_eq!(config.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_increase() {
        let calls = Mutex::new(Vec::new());
        let config = RetryConfig::default();

        let result = with_retry(&config, || {
            calls.lock().unwrap().push(Instant::now());
            let attempt = calls.lock().unwrap().len();
            async move {
                if attempt <= 3 {
                    Err(server_error())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 4);
        let calls = calls.lock().unwrap();
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        let expected = [1, 2, 4].map(Duration::from_secs);
        assert_eq!(gaps.len(), expected.len());
        for (gap, want) in gaps.iter().zip(expected) {
            assert!(*gap >= want && *gap < want + Duration::from_millis(10), "gap {gap:?}, want {want:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_last_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryConfig::default(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(server_error()) }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        match result {
            Err(ClientError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*source, ClientError::Http { status: 500, .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryConfig::default(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ClientError::Http {
                    status: 404,
                    body: "not found".to_string(),
                })
            }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ClientError::Http { status: 404, .. })));
    }
}
