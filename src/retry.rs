use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::RpcError;
use crate::logging::{ErrorLogger, LogContext};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay; attempt `n` is followed by a wait of `base_delay * n`
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Linear-backoff retry loop for a single RPC method
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
    clock: Arc<dyn Clock>,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
            clock,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-recoverable error,
    /// or `max_attempts` is reached. Exhaustion becomes
    /// [`RpcError::RetriesExhausted`] carrying the last error text.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let max_attempts = self.config.max_attempts;
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        ErrorLogger::log_recovery_success(&self.operation_name, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_recoverable() {
                LogContext::new("retry", &self.operation_name)
                    .with_retry_count(attempt)
                    .error(&format!("Non-recoverable error, aborting retries: {}", error));
                return Err(error);
            }

            ErrorLogger::log_retry_attempt(&self.operation_name, &error, attempt, max_attempts);

            if attempt >= max_attempts {
                return Err(RpcError::RetriesExhausted {
                    method: self.operation_name.clone(),
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let delay = self.config.delay_after(attempt);
            LogContext::new("retry", &self.operation_name)
                .with_retry_count(attempt)
                .with_duration_ms(delay.as_millis() as u64)
                .debug(&format!(
                    "Retrying in {}ms (attempt {} of {})",
                    delay.as_millis(),
                    attempt,
                    max_attempts
                ));
            self.clock.sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// Clock that records requested sleeps instead of waiting
    #[derive(Default)]
    pub(crate) struct RecordingClock {
        pub sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Clock for RecordingClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn manager(max_attempts: u32, clock: Arc<RecordingClock>) -> RetryManager {
        RetryManager::new(
            "sui_getCheckpoint",
            RetryConfig::new(max_attempts, Duration::from_secs(2)),
            clock,
        )
    }

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_linear_delay() {
        let config = RetryConfig::new(5, Duration::from_secs(2));
        assert_eq!(config.delay_after(1), Duration::from_secs(2));
        assert_eq!(config.delay_after(2), Duration::from_secs(4));
        assert_eq!(config.delay_after(3), Duration::from_secs(6));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let config = RetryConfig::new(0, Duration::from_secs(1));
        assert_eq!(config.max_attempts, 1);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let clock = Arc::new(RecordingClock::default());
        let result = manager(3, clock.clone())
            .execute(|| async { Ok::<u32, RpcError>(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_makes_exact_attempts_with_increasing_delays() {
        let clock = Arc::new(RecordingClock::default());
        let mut calls = 0u32;

        let result = manager(3, clock.clone())
            .execute(|| {
                calls += 1;
                async { Err::<u32, RpcError>(RpcError::Connection("refused".to_string())) }
            })
            .await;

        assert_eq!(calls, 3);
        match result {
            Err(RpcError::RetriesExhausted { method, attempts, last_error }) => {
                assert_eq!(method, "sui_getCheckpoint");
                assert_eq!(attempts, 3);
                assert!(last_error.contains("refused"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let sleeps = clock.sleeps.lock().unwrap().clone();
        assert_eq!(sleeps, vec![Duration::from_secs(2), Duration::from_secs(4)]);
        assert!(sleeps.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let clock = Arc::new(RecordingClock::default());
        let mut calls = 0u32;

        let result = manager(3, clock.clone())
            .execute(|| {
                calls += 1;
                let current = calls;
                async move {
                    if current < 2 {
                        Err(RpcError::Method { code: -32603, message: "busy".to_string() })
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 2);
        assert_eq!(clock.sleeps.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_recoverable_error_is_not_retried() {
        let clock = Arc::new(RecordingClock::default());
        let mut calls = 0u32;

        let result = manager(3, clock.clone())
            .execute(|| {
                calls += 1;
                async { Err::<u32, RpcError>(RpcError::InvalidResponse("no result".to_string())) }
            })
            .await;

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(RpcError::InvalidResponse(_))));
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }
}
