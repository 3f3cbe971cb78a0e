//! Bounded Redis connection pool
//!
//! Holds up to `max_connections` multiplexed async connections. Acquisition
//! is bounded by a semaphore and a timeout; exhaustion fails with a
//! retryable error instead of growing the pool or blocking indefinitely.
//! Connections are created lazily, probed periodically with PING, and
//! discarded (not returned) when an operation sees them fail.
//!
//! Dropping a [`PooledConnection`] mid-operation (caller cancellation)
//! returns the connection without further side effects; nothing here
//! auto-retries.

use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace, warn};

use crate::config::RedisConfig;
use crate::{CacheError, Result};

/// Bounded, health-probed pool of connections to one Redis backend.
pub struct ConnectionPool {
    client: redis::Client,
    idle: Arc<Mutex<Vec<MultiplexedConnection>>>,
    semaphore: Arc<Semaphore>,
    max_connections: usize,
    connect_timeout: Duration,
    op_timeout: Duration,
}

impl ConnectionPool {
    /// Build a pool for the configured backend.
    ///
    /// Fails with a configuration error when no host is set; callers model
    /// that case as a permanently disabled cache, not as a reachable pool.
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let info = config
            .connection_info()
            .ok_or_else(|| CacheError::Config("no cache backend host configured".to_string()))?;

        let client = redis::Client::open(info)?;

        Ok(Self {
            client,
            idle: Arc::new(Mutex::new(Vec::new())),
            semaphore: Arc::new(Semaphore::new(config.max_connections.max(1))),
            max_connections: config.max_connections.max(1),
            connect_timeout: config.connect_timeout(),
            op_timeout: config.op_timeout(),
        })
    }

    /// Acquire a connection, reusing an idle one or connecting lazily.
    ///
    /// Waits at most the connect timeout for a free slot.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let permit = tokio::time::timeout(
            self.connect_timeout,
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await
        .map_err(|_| CacheError::PoolExhausted {
            max_connections: self.max_connections,
        })?
        .map_err(|_| CacheError::Connection("connection pool closed".to_string()))?;

        let reused = self.idle.lock().pop();
        let conn = match reused {
            Some(conn) => {
                trace!("Reusing idle connection");
                conn
            }
            None => {
                debug!("Opening new backend connection");
                self.with_deadline(self.connect_timeout, self.client.get_multiplexed_async_connection())
                    .await?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            idle: Arc::clone(&self.idle),
            max_idle: self.max_connections,
            _permit: permit,
        })
    }

    /// Round-trip a PING on a pooled connection.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.acquire().await?;
        let outcome = self
            .with_timeout(redis::cmd("PING").query_async::<String>(&mut *conn))
            .await;
        match outcome {
            Ok(_) => Ok(()),
            Err(e) => {
                conn.discard();
                Err(e)
            }
        }
    }

    /// Probe every idle connection and evict the dead ones.
    ///
    /// Returns `(alive, evicted)`. Connections checked out during the probe
    /// are not touched; a dead one among them is discarded by its guard when
    /// its next operation fails.
    pub async fn probe_idle(&self) -> (usize, usize) {
        let candidates: Vec<MultiplexedConnection> =
            std::mem::take(&mut *self.idle.lock());
        let total = candidates.len();
        let mut alive = Vec::with_capacity(total);

        for mut conn in candidates {
            let pong = self
                .with_timeout(redis::cmd("PING").query_async::<String>(&mut conn))
                .await;
            match pong {
                Ok(_) => alive.push(conn),
                Err(e) => {
                    warn!(error = %e, "Evicting dead idle connection");
                }
            }
        }

        let alive_count = alive.len();
        {
            // Guards checked out during the probe may have returned their
            // connections already; keep the combined list within the bound.
            let mut idle = self.idle.lock();
            idle.extend(alive);
            idle.truncate(self.max_connections);
        }
        (alive_count, total - alive_count)
    }

    /// Apply the centralized per-operation timeout to a backend future.
    ///
    /// Every round trip the client issues goes through here, so deadline
    /// behavior is uniform instead of scattered at call sites.
    pub async fn with_timeout<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        self.with_deadline(self.op_timeout, fut).await
    }

    async fn with_deadline<T, F>(&self, deadline: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::Redis(e)),
            Err(_) => Err(CacheError::Timeout(deadline)),
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("max_connections", &self.max_connections)
            .field("idle", &self.idle_count())
            .finish_non_exhaustive()
    }
}

/// Return a connection to the idle list, or drop it once the list is full.
///
/// The idle list can race a probe cycle: `probe_idle` empties it while
/// awaiting PINGs, fresh connections get opened in the meantime, and both
/// sets come back. Bounding the push here keeps the pool from retaining more
/// than `max` sockets.
fn push_bounded<T>(idle: &mut Vec<T>, max: usize, conn: T) {
    if idle.len() < max {
        idle.push(conn);
    } else {
        trace!("Idle list full, dropping returned connection");
    }
}

/// RAII guard for a checked-out connection.
///
/// Returned to the idle list on drop unless [`discard`](Self::discard) was
/// called; the semaphore permit is released either way.
pub struct PooledConnection {
    conn: Option<MultiplexedConnection>,
    idle: Arc<Mutex<Vec<MultiplexedConnection>>>,
    max_idle: usize,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Drop the underlying connection instead of returning it to the pool.
    /// Call after an operation error; the next acquire reconnects lazily.
    pub fn discard(&mut self) {
        if self.conn.take().is_some() {
            debug!("Discarding broken connection");
        }
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = MultiplexedConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already discarded")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection already discarded")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            push_bounded(&mut self.idle.lock(), self.max_idle, conn);
        }
    }
}
