//! Circuit breaker
//!
//! Single three-state failure guard shared by the cache-backend path and by
//! every named retried operation. Instances are independent: the cache
//! breaker and a retry executor's breaker never share counters.
//!
//! ```text
//! Closed ──failure_count >= threshold──▶ Open
//! Open ──recovery_timeout elapsed──▶ HalfOpen   (on can_execute)
//! HalfOpen ──success──▶ Closed
//! HalfOpen ──failure──▶ Open
//! ```
//!
//! The breaker itself never fails: `can_execute`/`on_success`/`on_failure`
//! are pure state transitions, total over every `(state, event)` pair.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::BreakerConfig;

/// Operational mode of the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Failing fast, calls rejected without touching the resource
    Open,
    /// One trial call allowed to test recovery
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// Three-state circuit breaker guarding one protected resource.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        debug!(
            resource = %name,
            failure_threshold = config.failure_threshold,
            recovery_timeout_secs = config.recovery_timeout_secs,
            "Circuit breaker initialized"
        );
        Self {
            name,
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: config.recovery_timeout(),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
            }),
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// In `Open`, an elapsed recovery timeout transitions to `HalfOpen` as a
    /// side effect and admits the call as the trial.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure_time
                    .is_none_or(|t| t.elapsed() > self.recovery_timeout);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    info!(resource = %self.name, "Circuit breaker half-open, allowing trial call");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful round trip. Valid from any state; resets the
    /// failure count and closes the circuit.
    pub fn on_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(resource = %self.name, from = %inner.state, "Circuit breaker closed (recovered)");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
    }

    /// Record a failed round trip. Opens the circuit once the consecutive
    /// failure count reaches the threshold; a single failure while half-open
    /// always reopens.
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        let reopen_from_trial = inner.state == CircuitState::HalfOpen;
        if reopen_from_trial || inner.failure_count >= self.failure_threshold {
            if inner.state != CircuitState::Open {
                warn!(
                    resource = %self.name,
                    failure_count = inner.failure_count,
                    trial_failed = reopen_from_trial,
                    "Circuit breaker opened (failing fast)"
                );
            }
            inner.state = CircuitState::Open;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Route transition logs through a real subscriber so the state-change
    // events are rendered, not just constructed. Idempotent across tests.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("relicache=trace")
            .with_test_writer()
            .try_init();
    }

    fn breaker(threshold: u32, recovery_ms: u64) -> CircuitBreaker {
        init_tracing();
        let config = BreakerConfig {
            failure_threshold: threshold,
            recovery_timeout_secs: 0,
        };
        let mut cb = CircuitBreaker::new("test", config);
        cb.recovery_timeout = Duration::from_millis(recovery_ms);
        cb
    }

    #[test]
    fn test_starts_closed() {
        let cb = breaker(3, 1000);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = breaker(3, 1000);
        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());

        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, 1000);
        cb.on_failure();
        cb.on_failure();
        cb.on_success();
        assert_eq!(cb.failure_count(), 0);

        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_recovery_transitions_to_half_open() {
        let cb = breaker(1, 20);
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());

        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_success_closes() {
        let cb = breaker(1, 20);
        cb.on_failure();
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.can_execute());

        cb.on_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(5, 20);
        for _ in 0..5 {
            cb.on_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // One trial failure must reopen regardless of threshold.
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn test_open_stays_open_within_cooldown() {
        let cb = breaker(1, 10_000);
        cb.on_failure();
        for _ in 0..10 {
            assert!(!cb.can_execute());
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
