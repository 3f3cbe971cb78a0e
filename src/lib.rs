//! # Relicache
//!
//! Resilient namespaced cache client for Redis-compatible backends.
//!
//! ## Features
//!
//! - Namespaced categories with per-category default TTLs
//! - Bounded, health-probed connection pool
//! - Circuit breaker guarding the backend (closed / open / half-open)
//! - Tagged serialization: JSON with a MessagePack fallback
//! - Fail-silent client API: a cache outage degrades to misses, never errors
//! - Generic retry executor with capped exponential backoff and jitter
//! - Prometheus metrics and hit/miss/error counters
//!
//! ## Example
//!
//! ```ignore
//! use relicache::config::Config;
//! use relicache::client::CacheClient;
//!
//! let client = CacheClient::new(Config::from_env())?;
//! client.connect().await;
//! let profile: Option<Profile> = client.get("user_data", "42").await;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐      ┌──────────────────────────────────────┐
//! │ business code │─────▶│ CacheClient (fail-silent)            │
//! │               │      │  ├─ CategoryRegistry (namespacing)   │
//! │               │      │  ├─ Serializer (tagged J/M codec)    │
//! │               │      │  ├─ CircuitBreaker (backend guard)   │
//! │               │      │  └─ ConnectionPool ──▶ Redis         │
//! │               │      └──────────────────────────────────────┘
//! │               │      ┌──────────────────────────────────────┐
//! │               │─────▶│ RetryExecutor (propagating)          │
//! └───────────────┘      │  └─ CircuitBreaker (per operation)   │
//!                        └──────────────────────────────────────┘
//! ```
//!
//! The two circuit breakers are independent instances of the same FSM and
//! never share state.

// Modules
pub mod breaker;
pub mod category;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod prelude;
pub mod retry;
pub mod serializer;

// Re-exports for convenience
pub use client::CacheClient;
pub use error::{CacheError, Result, RetryError, Retryable};
pub use retry::{RetryExecutor, RetryPolicy};
