//! Error types for relicache

use thiserror::Error;

/// Main error type for cache-subsystem operations.
///
/// `CacheClient` absorbs every variant into a miss/`false` result; these
/// errors only cross the crate boundary through [`RetryError`] or internal
/// plumbing.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Connection pool exhausted ({max_connections} in use)")]
    PoolExhausted { max_connections: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Circuit breaker open for {resource}")]
    CircuitOpen { resource: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Classification used by the retry executor: transient faults are worth
/// retrying, everything else propagates on the first attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for CacheError {
    fn is_retryable(&self) -> bool {
        match self {
            CacheError::Connection(_)
            | CacheError::Timeout(_)
            | CacheError::PoolExhausted { .. } => true,
            CacheError::Redis(e) => redis_error_is_retryable(e),
            CacheError::Serialization(_)
            | CacheError::CircuitOpen { .. }
            | CacheError::Config(_) => false,
        }
    }
}

impl Retryable for redis::RedisError {
    fn is_retryable(&self) -> bool {
        redis_error_is_retryable(self)
    }
}

impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::TimedOut
                | ErrorKind::WouldBlock
                | ErrorKind::Interrupted
        )
    }
}

fn redis_error_is_retryable(e: &redis::RedisError) -> bool {
    use redis::ErrorKind;
    if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal() {
        return true;
    }
    matches!(
        e.kind(),
        ErrorKind::BusyLoadingError | ErrorKind::TryAgain | ErrorKind::MasterDown
    )
}

/// Errors surfaced by [`RetryExecutor`](crate::retry::RetryExecutor).
///
/// Unlike `CacheClient`, the executor propagates: the wrapped operation's
/// error type `E` is carried through so callers can recover it after the
/// retry budget is spent.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The executor's circuit breaker rejected the call before the operation
    /// ran; no attempt was consumed.
    #[error("Circuit breaker open for operation '{operation}'")]
    Open { operation: String },

    /// The error was classified non-retryable and propagated on the first
    /// failing attempt.
    #[error("Non-retryable error: {0}")]
    Permanent(#[source] E),

    /// All attempts failed; carries the last error observed.
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Recover the wrapped operation error, if any.
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Open { .. } => None,
            RetryError::Permanent(e) | RetryError::Exhausted { source: e, .. } => Some(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CacheError::Connection("refused".into()).is_retryable());
        assert!(CacheError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(CacheError::PoolExhausted { max_connections: 8 }.is_retryable());

        assert!(!CacheError::Serialization("bad tag".into()).is_retryable());
        assert!(!CacheError::Config("missing host".into()).is_retryable());
        assert!(!CacheError::CircuitOpen { resource: "redis".into() }.is_retryable());
    }

    #[test]
    fn test_io_error_classification() {
        use std::io::{Error, ErrorKind};
        assert!(Error::from(ErrorKind::ConnectionRefused).is_retryable());
        assert!(Error::from(ErrorKind::TimedOut).is_retryable());
        assert!(!Error::from(ErrorKind::PermissionDenied).is_retryable());
        assert!(!Error::from(ErrorKind::NotFound).is_retryable());
    }

    #[test]
    fn test_retry_error_into_source() {
        let e: RetryError<String> = RetryError::Exhausted {
            attempts: 3,
            source: "boom".to_string(),
        };
        assert_eq!(e.into_source().as_deref(), Some("boom"));

        let e: RetryError<String> = RetryError::Open { operation: "op".into() };
        assert!(e.into_source().is_none());
    }
}
