//! Configuration for relicache

use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub redis: RedisConfig,
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    /// Category registry entries; see [`crate::category::CategoryRegistry`].
    pub categories: Vec<CategoryConfig>,
}

/// Backend (Redis) connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Backend host. `None` is a supported configuration: the client starts
    /// permanently disabled and every operation degrades to a miss/no-op.
    pub host: Option<String>,

    /// Backend port
    pub port: u16,

    /// Optional AUTH password (secret; never logged)
    pub password: Option<String>,

    /// Logical database index
    pub db: i64,

    /// Maximum number of pooled connections
    pub max_connections: usize,

    /// Timeout for establishing a connection (also bounds pool acquire)
    pub connect_timeout_secs: u64,

    /// Per-operation read/write timeout
    pub op_timeout_secs: u64,

    /// Interval between background health probes of idle connections
    pub health_check_interval_secs: u64,

    /// Number of connect attempts before the client soft-disables itself
    pub connect_attempts: u32,

    /// Fixed delay between connect attempts
    pub connect_retry_delay_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 6379,
            password: None,
            db: 0,
            max_connections: 10,
            connect_timeout_secs: 5,
            op_timeout_secs: 5,
            health_check_interval_secs: 30,
            connect_attempts: 3,
            connect_retry_delay_secs: 1,
        }
    }
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.op_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_delay_secs)
    }

    /// Build a `redis` crate connection descriptor, or `None` when no host
    /// is configured.
    pub fn connection_info(&self) -> Option<redis::ConnectionInfo> {
        let host = self.host.clone()?;
        Some(redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(host, self.port),
            redis: redis::RedisConnectionInfo {
                db: self.db,
                username: None,
                password: self.password.clone(),
                protocol: redis::ProtocolVersion::RESP2,
            },
        })
    }
}

/// Circuit breaker configuration, shared by the cache-backend guard and
/// each named retried operation.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Cooldown before an open circuit allows a trial call
    pub recovery_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 30,
        }
    }
}

impl BreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

/// Default retry policy parameters
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempt budget (first call included)
    pub max_attempts: u32,

    /// Base delay before the second attempt, in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,

    /// Exponential growth factor
    pub exponential_base: f64,

    /// Multiply each delay by a uniform factor in [0.5, 1.0]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

/// One category registry entry
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub key_prefix: String,
    pub default_ttl_secs: u64,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::CacheError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&contents)
            .map_err(|e| crate::CacheError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("RELICACHE_REDIS_HOST")
            && !host.is_empty()
        {
            config.redis.host = Some(host);
        }

        if let Ok(port) = std::env::var("RELICACHE_REDIS_PORT")
            && let Ok(n) = port.parse()
        {
            config.redis.port = n;
        }

        if let Ok(password) = std::env::var("RELICACHE_REDIS_PASSWORD") {
            config.redis.password = Some(password);
        }

        if let Ok(db) = std::env::var("RELICACHE_REDIS_DB")
            && let Ok(n) = db.parse()
        {
            config.redis.db = n;
        }

        if let Ok(max_conn) = std::env::var("RELICACHE_MAX_CONNECTIONS")
            && let Ok(n) = max_conn.parse()
        {
            config.redis.max_connections = n;
        }

        if let Ok(threshold) = std::env::var("RELICACHE_FAILURE_THRESHOLD")
            && let Ok(n) = threshold.parse()
        {
            config.breaker.failure_threshold = n;
        }

        if let Ok(timeout) = std::env::var("RELICACHE_RECOVERY_TIMEOUT_SECS")
            && let Ok(n) = timeout.parse()
        {
            config.breaker.recovery_timeout_secs = n;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.redis.host.is_none());
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.redis.max_connections, 10);
        assert_eq!(config.redis.op_timeout(), Duration::from_secs(5));
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.retry.jitter);
        assert!(config.categories.is_empty());
    }

    #[test]
    fn test_no_host_means_no_connection_info() {
        let config = RedisConfig::default();
        assert!(config.connection_info().is_none());
    }

    #[test]
    fn test_connection_info() {
        let config = RedisConfig {
            host: Some("cache.internal".to_string()),
            port: 6380,
            db: 2,
            ..Default::default()
        };
        let info = config.connection_info().unwrap();
        assert_eq!(info.redis.db, 2);
        match info.addr {
            redis::ConnectionAddr::Tcp(host, port) => {
                assert_eq!(host, "cache.internal");
                assert_eq!(port, 6380);
            }
            other => panic!("unexpected addr: {other:?}"),
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[redis]
host = "localhost"
port = 6390
max_connections = 4

[breaker]
failure_threshold = 2
recovery_timeout_secs = 10

[retry]
max_attempts = 5
jitter = false

[[categories]]
name = "user_data"
key_prefix = "user:"
default_ttl_secs = 300
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.redis.host.as_deref(), Some("localhost"));
        assert_eq!(config.redis.port, 6390);
        assert_eq!(config.redis.max_connections, 4);
        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(!config.retry.jitter);
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories[0].key_prefix, "user:");
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/nonexistent/relicache.toml");
        assert!(matches!(result, Err(crate::CacheError::Config(_))));
    }
}
