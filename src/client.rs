//! Namespaced cache client facade
//!
//! Composes the serializer, connection pool and circuit breaker behind the
//! public get/set/batch/admin API. Every operation is namespaced by a
//! registered category and is fail-silent: a disabled or unreachable backend
//! degrades to misses and no-op writes, never to an error at the call site.
//!
//! The client is constructed once by the application root and shared by
//! `Arc`; lifecycle is explicit `connect()`/`disconnect()`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::breaker::CircuitBreaker;
use crate::category::{CacheCategory, CategoryRegistry};
use crate::config::Config;
use crate::metrics::{BackendInfo, CacheStats, Metrics, PerfCounters};
use crate::pool::ConnectionPool;
use crate::serializer::Serializer;
use crate::{CacheError, Result};

/// Keys per DEL round trip in `clear_prefix`.
const DELETE_CHUNK: usize = 500;

/// Resilient, namespaced client over a Redis-compatible backend.
pub struct CacheClient {
    config: Config,
    registry: CategoryRegistry,
    serializer: Serializer,
    pool: Option<Arc<ConnectionPool>>,
    breaker: CircuitBreaker,
    counters: PerfCounters,
    metrics: Arc<Metrics>,
    disabled: AtomicBool,
    probe_token: parking_lot::Mutex<Option<CancellationToken>>,
}

impl CacheClient {
    /// Build a client from configuration.
    ///
    /// A missing backend host is valid: the client starts permanently
    /// disabled and every call degrades silently. Category definitions are
    /// validated here; an invalid registry is a configuration error.
    pub fn new(config: Config) -> Result<Self> {
        let registry = CategoryRegistry::from_config(&config.categories)?;
        Self::with_registry(config, registry)
    }

    /// Build a client with a programmatically constructed registry.
    pub fn with_registry(config: Config, registry: CategoryRegistry) -> Result<Self> {
        let pool = match config.redis.host {
            Some(_) => Some(Arc::new(ConnectionPool::new(&config.redis)?)),
            None => {
                warn!("No cache backend host configured, cache is disabled");
                None
            }
        };

        let breaker = CircuitBreaker::new("cache_backend", config.breaker);

        Ok(Self {
            disabled: AtomicBool::new(true),
            pool,
            breaker,
            registry,
            serializer: Serializer::new(),
            counters: PerfCounters::new(),
            metrics: Arc::new(Metrics::new()),
            probe_token: parking_lot::Mutex::new(None),
            config,
        })
    }

    /// Attempt to reach the backend, up to the configured attempt count with
    /// a fixed delay between attempts.
    ///
    /// Returns `false` and leaves the client soft-disabled on exhaustion; a
    /// later [`health_check`](Self::health_check) can still recover it.
    pub async fn connect(&self) -> bool {
        let Some(pool) = self.pool.as_ref() else {
            return false;
        };

        let attempts = self.config.redis.connect_attempts.max(1);
        for attempt in 1..=attempts {
            match pool.ping().await {
                Ok(()) => {
                    info!(attempt, "Connected to cache backend");
                    self.disabled.store(false, Ordering::SeqCst);
                    self.breaker.on_success();
                    self.publish_breaker_state();
                    self.start_probe_task();
                    return true;
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Cache backend connect attempt failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.redis.connect_retry_delay()).await;
                    }
                }
            }
        }

        warn!("Cache backend unreachable, entering disabled mode");
        self.disabled.store(true, Ordering::SeqCst);
        false
    }

    /// Stop the background probe and disable the client.
    pub fn disconnect(&self) {
        if let Some(token) = self.probe_token.lock().take() {
            token.cancel();
        }
        self.disabled.store(true, Ordering::SeqCst);
        info!("Cache client disconnected");
    }

    /// Fetch a value. Returns `None` on miss, on any backend failure, and
    /// whenever the client is disabled or the circuit is open.
    ///
    /// # Panics
    /// Panics if `category` is not registered.
    pub async fn get<T: DeserializeOwned>(&self, category: &str, key: &str) -> Option<T> {
        let category = self.registry.resolve(category);
        let full_key = category.full_key(key);

        if !self.check_ready() {
            self.note_miss();
            return None;
        }

        let mut cmd = redis::cmd("GET");
        cmd.arg(&full_key);

        let timer = self.metrics.op_latency.start_timer();
        let fetched: Result<Option<Vec<u8>>> = self.execute_cmd(&cmd).await;
        timer.observe_duration();

        match fetched {
            Ok(Some(raw)) => match self.serializer.decode(&raw) {
                Ok(value) => {
                    self.note_hit();
                    Some(value)
                }
                Err(e) => {
                    // Stale or foreign encoding; a decode failure is a miss.
                    warn!(key = %full_key, error = %e, "Failed to decode cached value");
                    self.note_error();
                    None
                }
            },
            Ok(None) => {
                self.note_miss();
                None
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache get failed");
                self.note_error();
                None
            }
        }
    }

    /// Store a value with the category's default TTL or an explicit one.
    /// Returns `false` on any failure; never raises.
    ///
    /// # Panics
    /// Panics if `category` is not registered.
    pub async fn set<T: Serialize>(
        &self,
        category: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let category = self.registry.resolve(category);
        let full_key = category.full_key(key);

        let Some(ttl_secs) = self.resolve_ttl(category, ttl) else {
            return false;
        };

        if !self.check_ready() {
            return false;
        }

        let encoded = match self.serializer.encode(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to encode value");
                self.note_error();
                return false;
            }
        };

        let mut cmd = redis::cmd("SETEX");
        cmd.arg(&full_key).arg(ttl_secs).arg(&encoded[..]);

        let timer = self.metrics.op_latency.start_timer();
        let stored: Result<()> = self.execute_cmd(&cmd).await;
        timer.observe_duration();

        match stored {
            Ok(()) => {
                self.note_op();
                true
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache set failed");
                self.note_error();
                false
            }
        }
    }

    /// Batched fetch, single round trip. The result preserves input key
    /// order, with `None` per miss. Disabled or failing backends yield all
    /// `None`.
    ///
    /// # Panics
    /// Panics if `category` is not registered.
    pub async fn mget<T: DeserializeOwned>(
        &self,
        category: &str,
        keys: &[&str],
    ) -> Vec<Option<T>> {
        let category = self.registry.resolve(category);
        if keys.is_empty() {
            return Vec::new();
        }

        let full_keys: Vec<String> = keys.iter().map(|k| category.full_key(k)).collect();

        if !self.check_ready() {
            for _ in keys {
                self.note_miss();
            }
            return keys.iter().map(|_| None).collect();
        }

        let mut cmd = redis::cmd("MGET");
        cmd.arg(&full_keys);

        let timer = self.metrics.op_latency.start_timer();
        let fetched: Result<Vec<Option<Vec<u8>>>> = self.execute_cmd(&cmd).await;
        timer.observe_duration();

        match fetched {
            Ok(rows) => rows
                .into_iter()
                .map(|row| match row {
                    Some(raw) => match self.serializer.decode(&raw) {
                        Ok(value) => {
                            self.note_hit();
                            Some(value)
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to decode cached value in batch");
                            self.note_error();
                            None
                        }
                    },
                    None => {
                        self.note_miss();
                        None
                    }
                })
                .collect(),
            Err(e) => {
                warn!(category = %category.name, error = %e, "Cache mget failed");
                self.note_error();
                keys.iter().map(|_| None).collect()
            }
        }
    }

    /// Batched store in one atomic transaction (MULTI/EXEC pipeline of MSET
    /// plus per-key EXPIRE); a concurrent reader observes the whole batch or
    /// none of it.
    ///
    /// # Panics
    /// Panics if `category` is not registered.
    pub async fn mset<T: Serialize>(
        &self,
        category: &str,
        pairs: &[(&str, T)],
        ttl: Option<Duration>,
    ) -> bool {
        let category = self.registry.resolve(category);
        if pairs.is_empty() {
            return true;
        }

        let Some(ttl_secs) = self.resolve_ttl(category, ttl) else {
            return false;
        };

        if !self.check_ready() {
            return false;
        }

        // Serialize everything up front so a bad value never produces a
        // partial batch.
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match self.serializer.encode(value) {
                Ok(encoded) => entries.push((category.full_key(key), encoded)),
                Err(e) => {
                    warn!(category = %category.name, key = %key, error = %e, "Failed to encode batch value");
                    self.note_error();
                    return false;
                }
            }
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut mset = redis::cmd("MSET");
        for (full_key, encoded) in &entries {
            mset.arg(full_key).arg(&encoded[..]);
        }
        pipe.add_command(mset).ignore();
        for (full_key, _) in &entries {
            pipe.cmd("EXPIRE").arg(full_key).arg(ttl_secs).ignore();
        }

        let timer = self.metrics.op_latency.start_timer();
        let stored: Result<()> = self.execute_pipe(&pipe).await;
        timer.observe_duration();

        match stored {
            Ok(()) => {
                self.note_op();
                true
            }
            Err(e) => {
                warn!(category = %category.name, error = %e, "Cache mset failed");
                self.note_error();
                false
            }
        }
    }

    /// Delete one key. Returns `true` only when the key existed and was
    /// removed.
    ///
    /// # Panics
    /// Panics if `category` is not registered.
    pub async fn delete(&self, category: &str, key: &str) -> bool {
        let category = self.registry.resolve(category);
        let full_key = category.full_key(key);

        if !self.check_ready() {
            return false;
        }

        let mut cmd = redis::cmd("DEL");
        cmd.arg(&full_key);

        match self.execute_cmd::<i64>(&cmd).await {
            Ok(n) => {
                self.note_op();
                n > 0
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache delete failed");
                self.note_error();
                false
            }
        }
    }

    /// Whether a key currently exists (and has not expired).
    ///
    /// # Panics
    /// Panics if `category` is not registered.
    pub async fn exists(&self, category: &str, key: &str) -> bool {
        let category = self.registry.resolve(category);
        let full_key = category.full_key(key);

        if !self.check_ready() {
            return false;
        }

        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(&full_key);

        match self.execute_cmd::<i64>(&cmd).await {
            Ok(n) => {
                self.note_op();
                n > 0
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache exists failed");
                self.note_error();
                false
            }
        }
    }

    /// Reset a key's TTL. Returns `false` for missing keys and on failure.
    ///
    /// # Panics
    /// Panics if `category` is not registered.
    pub async fn expire(&self, category: &str, key: &str, ttl: Duration) -> bool {
        let category = self.registry.resolve(category);
        let full_key = category.full_key(key);

        let Some(ttl_secs) = self.resolve_ttl(category, Some(ttl)) else {
            return false;
        };

        if !self.check_ready() {
            return false;
        }

        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(&full_key).arg(ttl_secs);

        match self.execute_cmd::<i64>(&cmd).await {
            Ok(n) => {
                self.note_op();
                n > 0
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache expire failed");
                self.note_error();
                false
            }
        }
    }

    /// Bulk invalidation: delete every key under the category's prefix.
    /// Returns the number of keys deleted (0 on failure or when disabled).
    ///
    /// # Panics
    /// Panics if `category` is not registered.
    pub async fn clear_prefix(&self, category: &str) -> u64 {
        let category = self.registry.resolve(category);
        let pattern = category.key_pattern();

        if !self.check_ready() {
            return 0;
        }

        let mut scan = redis::cmd("KEYS");
        scan.arg(&pattern);

        let keys = match self.execute_cmd::<Vec<String>>(&scan).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Cache prefix scan failed");
                self.note_error();
                return 0;
            }
        };

        if keys.is_empty() {
            self.note_op();
            return 0;
        }

        let mut deleted: u64 = 0;
        for chunk in keys.chunks(DELETE_CHUNK) {
            let mut del = redis::cmd("DEL");
            del.arg(chunk);
            match self.execute_cmd::<i64>(&del).await {
                Ok(n) => deleted += n.max(0) as u64,
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Cache prefix delete failed");
                    self.note_error();
                    return deleted;
                }
            }
        }

        debug!(category = %category.name, deleted, "Cleared category prefix");
        self.note_op();
        deleted
    }

    /// Counters, hit rate, circuit state, pool occupancy and (when the
    /// backend answers) INFO fields.
    pub async fn get_stats(&self) -> CacheStats {
        let backend = if self.check_ready() {
            match self.execute_cmd::<String>(&redis::cmd("INFO")).await {
                Ok(raw) => Some(BackendInfo::parse(&raw)),
                Err(e) => {
                    debug!(error = %e, "Backend INFO unavailable");
                    None
                }
            }
        } else {
            None
        };

        let (idle, max) = self
            .pool
            .as_ref()
            .map_or((0, 0), |p| (p.idle_count(), p.max_connections()));
        self.metrics.pool_idle.set(idle as i64);

        CacheStats {
            enabled: self.is_enabled(),
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            errors: self.counters.errors(),
            total_operations: self.counters.total_operations(),
            hit_rate: self.counters.hit_rate(),
            circuit_state: self.breaker.state(),
            idle_connections: idle,
            max_connections: max,
            backend,
        }
    }

    /// Explicit reachability probe. A success while soft-disabled re-enables
    /// the client (the reconnect path after a failed `connect()`).
    pub async fn health_check(&self) -> bool {
        let Some(pool) = self.pool.as_ref() else {
            return false;
        };

        match pool.ping().await {
            Ok(()) => {
                if self.disabled.swap(false, Ordering::SeqCst) {
                    info!("Cache backend reachable again, re-enabling client");
                    self.start_probe_task();
                }
                self.breaker.on_success();
                self.publish_breaker_state();
                true
            }
            Err(e) => {
                warn!(error = %e, "Cache health check failed");
                if !self.disabled.load(Ordering::SeqCst) {
                    self.breaker.on_failure();
                    self.publish_breaker_state();
                }
                false
            }
        }
    }

    /// Whether the client will currently attempt backend calls.
    pub fn is_enabled(&self) -> bool {
        !self.disabled.load(Ordering::SeqCst) && self.pool.is_some()
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Prometheus metrics handle, for the host application to expose.
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    // -- internals ---------------------------------------------------------

    /// Gate every backend call: disabled mode and an open circuit both mean
    /// "skip the backend entirely".
    fn check_ready(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if !self.breaker.can_execute() {
            self.metrics.circuit_rejections.inc();
            self.publish_breaker_state();
            return false;
        }
        true
    }

    /// One command round trip on a pooled connection, with the centralized
    /// per-operation timeout and breaker bookkeeping. A failing connection
    /// is discarded instead of returned to the pool.
    async fn execute_cmd<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T> {
        let pool = self.pool()?;
        let mut conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                self.breaker.on_failure();
                self.publish_breaker_state();
                return Err(e);
            }
        };

        let outcome = pool.with_timeout(cmd.query_async::<T>(&mut *conn)).await;
        self.settle(&mut conn, outcome)
    }

    /// Like [`execute_cmd`](Self::execute_cmd), for a pipeline.
    async fn execute_pipe<T: redis::FromRedisValue>(&self, pipe: &redis::Pipeline) -> Result<T> {
        let pool = self.pool()?;
        let mut conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                self.breaker.on_failure();
                self.publish_breaker_state();
                return Err(e);
            }
        };

        let outcome = pool.with_timeout(pipe.query_async::<T>(&mut *conn)).await;
        self.settle(&mut conn, outcome)
    }

    fn settle<T>(&self, conn: &mut crate::pool::PooledConnection, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.breaker.on_success();
                self.publish_breaker_state();
                Ok(value)
            }
            Err(e) => {
                conn.discard();
                self.breaker.on_failure();
                self.publish_breaker_state();
                Err(e)
            }
        }
    }

    fn pool(&self) -> Result<&Arc<ConnectionPool>> {
        self.pool
            .as_ref()
            .ok_or_else(|| CacheError::Config("cache backend not configured".to_string()))
    }

    /// Resolve the effective TTL in whole seconds; rejects zero to keep the
    /// "ttl > 0 at the point of write" invariant.
    fn resolve_ttl(&self, category: &CacheCategory, ttl: Option<Duration>) -> Option<u64> {
        let effective = ttl.unwrap_or(category.default_ttl);
        let secs = effective.as_secs();
        if secs == 0 {
            warn!(category = %category.name, "Rejecting write with zero TTL");
            self.note_error();
            return None;
        }
        Some(secs)
    }

    fn start_probe_task(&self) {
        let Some(pool) = self.pool.as_ref() else {
            return;
        };

        let mut guard = self.probe_token.lock();
        if guard.is_some() {
            return;
        }

        let token = CancellationToken::new();
        *guard = Some(token.clone());

        let pool = Arc::clone(pool);
        let metrics = Arc::clone(&self.metrics);
        let interval = self.config.redis.health_check_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; skip it so probes start one
            // interval after connect.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Health probe task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let (alive, evicted) = pool.probe_idle().await;
                        metrics.pool_idle.set(alive as i64);
                        if evicted > 0 {
                            warn!(alive, evicted, "Health probe evicted dead connections");
                        }
                    }
                }
            }
        });
    }

    fn publish_breaker_state(&self) {
        self.metrics.set_circuit_state(self.breaker.state());
    }

    fn note_hit(&self) {
        self.counters.record_hit();
        self.metrics.hits.inc();
        self.metrics.operations.inc();
    }

    fn note_miss(&self) {
        self.counters.record_miss();
        self.metrics.misses.inc();
        self.metrics.operations.inc();
    }

    fn note_error(&self) {
        self.counters.record_error();
        self.metrics.errors.inc();
        self.metrics.operations.inc();
    }

    fn note_op(&self) {
        self.counters.record_op();
        self.metrics.operations.inc();
    }
}

impl Drop for CacheClient {
    fn drop(&mut self) {
        if let Some(token) = self.probe_token.lock().take() {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("enabled", &self.is_enabled())
            .field("categories", &self.registry.names())
            .field("circuit_state", &self.breaker.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use serde_json::json;

    fn disabled_client() -> CacheClient {
        let registry = CategoryRegistry::builder()
            .category("user_data", "user:", Duration::from_secs(300))
            .category("odds", "odds:", Duration::from_secs(30))
            .build()
            .unwrap();
        CacheClient::with_registry(Config::default(), registry).unwrap()
    }

    #[tokio::test]
    async fn test_disabled_get_is_miss() {
        let client = disabled_client();
        let value: Option<serde_json::Value> = client.get("user_data", "42").await;
        assert!(value.is_none());
        assert_eq!(client.counters.misses(), 1);
        assert_eq!(client.counters.hits(), 0);
    }

    #[tokio::test]
    async fn test_disabled_set_is_noop() {
        let client = disabled_client();
        let stored = client
            .set("user_data", "42", &json!({"name": "Ann", "score": 17}), None)
            .await;
        assert!(!stored);
        assert_eq!(client.counters.errors(), 0);
    }

    #[tokio::test]
    async fn test_disabled_admin_ops() {
        let client = disabled_client();
        assert!(!client.delete("user_data", "42").await);
        assert!(!client.exists("user_data", "42").await);
        assert!(
            !client
                .expire("user_data", "42", Duration::from_secs(10))
                .await
        );
        assert_eq!(client.clear_prefix("user_data").await, 0);
        assert!(!client.connect().await);
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_disabled_mget_preserves_order() {
        let client = disabled_client();
        let values: Vec<Option<String>> = client.mget("odds", &["a", "b", "c"]).await;
        assert_eq!(values, vec![None, None, None]);
        assert_eq!(client.counters.misses(), 3);
    }

    #[tokio::test]
    async fn test_disabled_bulk_never_panics() {
        let client = disabled_client();
        for i in 0..10_000_u64 {
            let key = format!("k{}", fastrand::u32(..));
            if i % 2 == 0 {
                let got: Option<u64> = client.get("user_data", &key).await;
                assert!(got.is_none());
            } else {
                assert!(!client.set("user_data", &key, &i, None).await);
            }
        }
        assert_eq!(client.counters.total_operations(), 5000);
    }

    #[tokio::test]
    #[should_panic(expected = "not registered")]
    async fn test_unregistered_category_panics_even_when_disabled() {
        let client = disabled_client();
        let _: Option<String> = client.get("sessions", "x").await;
    }

    #[tokio::test]
    async fn test_zero_ttl_write_rejected() {
        let client = disabled_client();
        let stored = client
            .set("user_data", "42", &"v", Some(Duration::ZERO))
            .await;
        assert!(!stored);
        assert_eq!(client.counters.errors(), 1);
    }

    #[tokio::test]
    async fn test_stats_snapshot_when_disabled() {
        let client = disabled_client();
        let _: Option<String> = client.get("user_data", "a").await;
        let _: Option<String> = client.get("user_data", "b").await;

        let stats = client.get_stats().await;
        assert!(!stats.enabled);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.circuit_state, CircuitState::Closed);
        assert!(stats.backend.is_none());
    }

    #[tokio::test]
    async fn test_empty_batches() {
        let client = disabled_client();
        let values: Vec<Option<String>> = client.mget("odds", &[]).await;
        assert!(values.is_empty());

        let pairs: [(&str, u32); 0] = [];
        assert!(client.mset("odds", &pairs, None).await);
    }

    #[test]
    fn test_new_from_config_validates_categories() {
        let mut config = Config::default();
        config.categories.push(crate::config::CategoryConfig {
            name: "bad".to_string(),
            key_prefix: String::new(),
            default_ttl_secs: 10,
        });
        assert!(matches!(
            CacheClient::new(config),
            Err(CacheError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_stays_fail_silent() {
        let mut config = Config::default();
        config.redis.host = Some("127.0.0.1".to_string());
        config.redis.port = 1;
        config.redis.connect_timeout_secs = 1;
        config.redis.op_timeout_secs = 1;
        config.redis.connect_attempts = 1;
        config.redis.connect_retry_delay_secs = 0;

        let registry = CategoryRegistry::builder()
            .category("user_data", "user:", Duration::from_secs(300))
            .build()
            .unwrap();
        let client = CacheClient::with_registry(config, registry).unwrap();

        assert!(!client.connect().await);
        assert!(!client.is_enabled());

        // Still disabled, so operations never reach the dead backend.
        let got: Option<String> = client.get("user_data", "42").await;
        assert!(got.is_none());
        assert!(!client.set("user_data", "42", &"v", None).await);
    }
}
