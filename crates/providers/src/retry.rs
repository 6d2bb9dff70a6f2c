//! Retry policy for model calls.
//!
//! Transient failures (rate limits, timeouts, network errors, 5xx) are
//! retried with exponential backoff. Everything else fails immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};
use webagent_config::AgentConfig;
use webagent_core::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether a failure on attempt `attempt` (1-based) should be retried.
    pub fn should_retry(&self, attempt: u32, error: &ModelError) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }

    /// Backoff before the attempt following `attempt`.
    ///
    /// `base * 2^(attempt-1)` capped at `max_delay`; a longer server
    /// `retry-after` wins.
    pub fn delay_for(&self, attempt: u32, error: &ModelError) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        match error {
            ModelError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs))
            }
            _ => backoff,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ModelError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(call = label, attempt, "Model call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if self.should_retry(attempt, &e) => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(
                        call = label,
                        attempt,
                        total = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient model error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy();
        let err = ModelError::Network("reset".into());
        assert_eq!(p.delay_for(1, &err), Duration::from_millis(100));
        assert_eq!(p.delay_for(2, &err), Duration::from_millis(200));
        assert_eq!(p.delay_for(3, &err), Duration::from_millis(300));
        assert_eq!(p.delay_for(40, &err), Duration::from_millis(300));
    }

    #[test]
    fn retry_after_wins_when_longer() {
        let err = ModelError::RateLimited { retry_after_secs: 2 };
        assert_eq!(policy().delay_for(1, &err), Duration::from_secs(2));
    }

    #[test]
    fn only_transient_errors_retry() {
        let p = policy();
        assert!(p.should_retry(1, &ModelError::Timeout("slow".into())));
        assert!(!p.should_retry(3, &ModelError::Timeout("slow".into())));
        assert!(!p.should_retry(1, &ModelError::AuthenticationFailed("bad key".into())));
        assert!(!p.should_retry(
            1,
            &ModelError::ApiError {
                status_code: 400,
                message: "bad request".into()
            }
        ));
    }

    #[test]
    fn from_config_never_zero_attempts() {
        let config = AgentConfig {
            retry_max_attempts: 0,
            ..AgentConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let out = policy()
            .run("test", |attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Err(ModelError::ApiError {
                            status_code: 503,
                            message: "overloaded".into(),
                        })
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = policy()
            .run("test", |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ModelError::Network("down".into()))
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Network(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_does_not_retry_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let _ = policy()
            .run("test", |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ModelError::ModelNotFound("nope".into()))
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
