//! Prelude module for common imports.
//!
//! This module re-exports commonly used types and traits for convenience.
//!
//! # Usage
//!
//! ```ignore
//! use relicache::prelude::*;
//! ```

// Error types
pub use crate::error::{CacheError, Result, RetryError, Retryable};

// Configuration
pub use crate::config::{BreakerConfig, Config, RedisConfig, RetryConfig};

// Categories
pub use crate::category::{CacheCategory, CategoryRegistry};

// Circuit breaker
pub use crate::breaker::{CircuitBreaker, CircuitState};

// Client
pub use crate::client::CacheClient;

// Retry
pub use crate::retry::{RetryExecutor, RetryPolicy};

// Metrics
pub use crate::metrics::{CacheStats, Metrics, PerfCounters};

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
