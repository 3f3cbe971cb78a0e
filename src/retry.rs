//! Generic retry executor with exponential backoff
//!
//! Wraps any fallible async operation. Transient errors are retried with
//! capped exponential backoff and optional jitter; non-retryable errors
//! (validation, auth, not-found) propagate on the first failing attempt.
//! Each executor owns a named [`CircuitBreaker`], independent of the cache
//! client's, and fails fast while it is open without consuming an attempt.
//!
//! Contract difference from `CacheClient`: the executor propagates. After
//! the attempt budget is spent the caller gets the last error back through
//! [`RetryError::Exhausted`].

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::config::{BreakerConfig, RetryConfig};
use crate::error::{RetryError, Retryable};

/// Backoff and budget parameters for one executor.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempt budget, first call included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Cap applied to every computed delay
    pub max_delay: Duration,
    /// Exponential growth factor
    pub exponential_base: f64,
    /// Multiply each delay by a uniform factor in [0.5, 1.0]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(RetryConfig::default())
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            exponential_base: config.exponential_base,
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// Deterministic delay before the attempt after `attempt` (1-based):
    /// `min(base * exponential_base^(attempt-1), max_delay)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.exponential_base.powi(exponent);
        let raw = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }

    /// Delay with jitter applied, when enabled. The uniform [0.5, 1.0]
    /// multiplier desynchronizes concurrent retrying callers.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay(attempt);
        if self.jitter {
            delay.mul_f64(0.5 + fastrand::f64() * 0.5)
        } else {
            delay
        }
    }
}

/// Retry wrapper protecting one named operation.
#[derive(Debug)]
pub struct RetryExecutor {
    name: String,
    policy: RetryPolicy,
    breaker: CircuitBreaker,
}

impl RetryExecutor {
    pub fn new(
        name: impl Into<String>,
        policy: RetryPolicy,
        breaker_config: BreakerConfig,
    ) -> Self {
        let name = name.into();
        let breaker = CircuitBreaker::new(format!("retry:{name}"), breaker_config);
        Self {
            name,
            policy,
            breaker,
        }
    }

    /// Run an operation whose error type knows its own retryability.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with(op, E::is_retryable).await
    }

    /// Run an operation with an explicit retryability predicate, for error
    /// types outside this crate.
    pub async fn run_with<T, E, F, Fut, P>(
        &self,
        mut op: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if !self.breaker.can_execute() {
                warn!(operation = %self.name, "Circuit open, failing fast");
                return Err(RetryError::Open {
                    operation: self.name.clone(),
                });
            }

            match op().await {
                Ok(value) => {
                    self.breaker.on_success();
                    if attempt > 1 {
                        debug!(operation = %self.name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !is_retryable(&e) => {
                    // Not a resource fault; does not feed the breaker.
                    debug!(operation = %self.name, error = %e, "Non-retryable error, propagating");
                    return Err(RetryError::Permanent(e));
                }
                Err(e) => {
                    self.breaker.on_failure();
                    if attempt == max_attempts {
                        warn!(
                            operation = %self.name,
                            attempts = max_attempts,
                            error = %e,
                            "Retry budget exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            attempts: max_attempts,
                            source: e,
                        });
                    }

                    let delay = self.policy.jittered_delay(attempt);
                    debug!(
                        operation = %self.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        unreachable!("retry loop returns within the attempt budget")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("transient")]
        Transient,
        #[error("invalid input")]
        Validation,
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            exponential_base: 2.0,
            jitter: false,
        }
    }

    fn executor(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new("test_op", policy(max_attempts), BreakerConfig::default())
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: false,
        };

        let delays: Vec<u64> = (1..=6).map(|a| policy.delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32]);

        // Capped at max_delay for all later attempts.
        assert_eq!(policy.delay(7), Duration::from_secs(60));
        assert_eq!(policy.delay(20), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_range() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(8),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
        };

        for _ in 0..100 {
            let jittered = policy.jittered_delay(1);
            assert!(jittered >= Duration::from_secs(4), "{jittered:?}");
            assert!(jittered <= Duration::from_secs(8), "{jittered:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let executor = executor(4);
        let calls = AtomicU32::new(0);

        let result = executor
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= 3 {
                        Err(TestError::Transient)
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let executor = executor(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(RetryError::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(source, TestError::Transient));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_propagates_immediately() {
        let executor = executor(5);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Validation) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Permanent(TestError::Validation))));
        // Validation failures do not count against the resource.
        assert_eq!(executor.breaker().failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_fails_fast() {
        let executor = RetryExecutor::new(
            "guarded_op",
            policy(3),
            BreakerConfig {
                failure_threshold: 1,
                recovery_timeout_secs: 3600,
            },
        );

        let _: Result<(), _> = executor
            .run(|| async { Err(TestError::Transient) })
            .await;
        assert_eq!(executor.breaker().state(), CircuitState::Open);

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = executor
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0, "operation must not run");
        assert!(matches!(result, Err(RetryError::Open { .. })));
    }

    #[tokio::test]
    async fn test_run_with_custom_predicate() {
        let executor = executor(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .run_with(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("denied".to_string()) }
                },
                |e| !e.contains("denied"),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Permanent(_))));
    }
}
