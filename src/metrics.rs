//! Performance counters and Prometheus metrics

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::breaker::CircuitState;

/// Lightweight atomic counters for the hot path. Monotonic for the process
/// lifetime; reset only on restart.
#[derive(Debug, Default)]
pub struct PerfCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub errors: AtomicU64,
    pub total_operations: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_op(&self) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn total_operations(&self) -> u64 {
        self.total_operations.load(Ordering::Relaxed)
    }

    /// `hits / (hits + misses)`, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let lookups = hits + self.misses();
        if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        }
    }
}

/// Prometheus metrics for the cache subsystem
pub struct Metrics {
    pub registry: Registry,

    // Hit/miss/error counters
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub errors: IntCounter,
    pub operations: IntCounter,

    // Circuit breaker state (0 = closed, 1 = open, 2 = half-open)
    pub circuit_state: IntGauge,
    pub circuit_rejections: IntCounter,

    // Pool gauges
    pub pool_idle: IntGauge,

    // Latency histogram
    pub op_latency: Histogram,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();

        let hits = IntCounter::new("relicache_hits_total", "Total cache hits").unwrap();
        let misses = IntCounter::new("relicache_misses_total", "Total cache misses").unwrap();
        let errors = IntCounter::new("relicache_errors_total", "Total cache errors").unwrap();
        let operations =
            IntCounter::new("relicache_operations_total", "Total cache operations").unwrap();

        let circuit_state = IntGauge::new(
            "relicache_circuit_state",
            "Circuit breaker state (0=closed, 1=open, 2=half-open)",
        )
        .unwrap();
        let circuit_rejections = IntCounter::new(
            "relicache_circuit_rejections_total",
            "Operations rejected by the open circuit breaker",
        )
        .unwrap();

        let pool_idle =
            IntGauge::new("relicache_pool_idle_connections", "Idle pooled connections").unwrap();

        let op_latency = Histogram::with_opts(
            HistogramOpts::new(
                "relicache_op_latency_seconds",
                "Cache operation latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .unwrap();

        registry.register(Box::new(hits.clone())).unwrap();
        registry.register(Box::new(misses.clone())).unwrap();
        registry.register(Box::new(errors.clone())).unwrap();
        registry.register(Box::new(operations.clone())).unwrap();
        registry.register(Box::new(circuit_state.clone())).unwrap();
        registry
            .register(Box::new(circuit_rejections.clone()))
            .unwrap();
        registry.register(Box::new(pool_idle.clone())).unwrap();
        registry.register(Box::new(op_latency.clone())).unwrap();

        Self {
            registry,
            hits,
            misses,
            errors,
            operations,
            circuit_state,
            circuit_rejections,
            pool_idle,
            op_latency,
        }
    }

    pub fn set_circuit_state(&self, state: CircuitState) {
        let value = match state {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        };
        self.circuit_state.set(value);
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot returned by `CacheClient::get_stats()`.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub total_operations: u64,
    pub hit_rate: f64,
    pub circuit_state: CircuitState,
    pub idle_connections: usize,
    pub max_connections: usize,
    /// Backend INFO fields; `None` when unreachable or disabled.
    pub backend: Option<BackendInfo>,
}

/// Fields parsed from the backend's INFO response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendInfo {
    pub redis_version: Option<String>,
    pub used_memory_bytes: Option<u64>,
    pub connected_clients: Option<u64>,
}

impl BackendInfo {
    /// Parse the `key:value` lines of an INFO response, ignoring sections
    /// and anything unknown.
    pub fn parse(raw: &str) -> Self {
        let mut info = Self::default();
        for line in raw.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key.trim() {
                "redis_version" => info.redis_version = Some(value.trim().to_string()),
                "used_memory" => info.used_memory_bytes = value.trim().parse().ok(),
                "connected_clients" => info.connected_clients = value.trim().parse().ok(),
                _ => {}
            }
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let counters = PerfCounters::new();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        counters.record_error();

        assert_eq!(counters.hits(), 2);
        assert_eq!(counters.misses(), 1);
        assert_eq!(counters.errors(), 1);
        assert_eq!(counters.total_operations(), 4);
    }

    #[test]
    fn test_hit_rate() {
        let counters = PerfCounters::new();
        assert_eq!(counters.hit_rate(), 0.0);

        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        assert!((counters.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_gather() {
        let metrics = Metrics::new();
        metrics.hits.inc();
        metrics.set_circuit_state(CircuitState::Open);

        let output = metrics.gather();
        assert!(output.contains("relicache_hits_total"));
        assert!(output.contains("relicache_circuit_state 1"));
    }

    #[test]
    fn test_backend_info_parse() {
        let raw = "# Server\r\nredis_version:7.2.4\r\n# Memory\r\nused_memory:1048576\r\nconnected_clients:3\r\nrole:master\r\n";
        let info = BackendInfo::parse(raw);
        assert_eq!(info.redis_version.as_deref(), Some("7.2.4"));
        assert_eq!(info.used_memory_bytes, Some(1_048_576));
        assert_eq!(info.connected_clients, Some(3));
    }

    #[test]
    fn test_backend_info_parse_garbage() {
        let info = BackendInfo::parse("not an info payload");
        assert_eq!(info, BackendInfo::default());
    }
}
