//! # Connection Pool
//!
//! Bounded pool of store connections with a blocking wait policy.
//!
//! Connections are dialed lazily. Acquisition hands out the most recently
//! released idle connection, discarding any that have sat idle past the
//! configured timeout; when nothing idle remains and `max_active` connections
//! are already checked out, the caller suspends until a release instead of
//! failing fast. Release is scoped: dropping the [`PooledConn`] guard returns
//! a healthy connection to the idle set (or closes it past `max_idle`) and
//! always closes one marked broken.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use redis::aio::MultiplexedConnection;
use redis::{AsyncConnectionConfig, Client};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{CacheError, Result};

/// Pool sizing and timeout parameters, fixed at construction.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Idle connections retained beyond this count are closed on release
    pub max_idle: usize,
    /// Concurrent checkout bound; 0 means unlimited
    pub max_active: usize,
    /// Idle connections older than this are discarded on acquisition
    pub idle_timeout: Duration,
    /// Dial timeout for new connections
    pub connect_timeout: Duration,
    /// Per-command reply timeout on dialed connections
    pub response_timeout: Duration,
}

struct IdleConn {
    conn: MultiplexedConnection,
    since: Instant,
}

/// Bounded pool of authenticated, namespace-selected store connections.
pub struct ConnectionPool {
    client: Client,
    cfg: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConn>>,
}

impl ConnectionPool {
    /// Create an empty pool. No connection is dialed until first acquisition.
    ///
    /// The `client` carries address, credential, and database selector;
    /// authentication and namespace selection happen once per dial, never
    /// per command.
    pub fn new(client: Client, cfg: PoolConfig) -> Arc<Self> {
        let max_active = if cfg.max_active == 0 {
            Semaphore::MAX_PERMITS
        } else {
            cfg.max_active
        };

        Arc::new(Self {
            client,
            permits: Arc::new(Semaphore::new(max_active)),
            idle: Mutex::new(VecDeque::new()),
            cfg,
        })
    }

    /// Check out a connection, suspending while `max_active` are in use.
    ///
    /// Prefers a fresh idle connection; dials otherwise. A dial failure
    /// (including auth or namespace selection) surfaces as an internal error
    /// and the permit is returned, so a waiter is never stranded behind a
    /// half-open session.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConn> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("pool semaphore is never closed");

        if let Some(conn) = self.checkout_idle() {
            return Ok(PooledConn::new(Arc::clone(self), conn, permit));
        }

        // Permit drops on error, waking one waiter.
        let conn = self.dial().await?;
        Ok(PooledConn::new(Arc::clone(self), conn, permit))
    }

    /// Number of idle connections currently retained.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().expect("pool idle list poisoned").len()
    }

    /// Pop the most recently released idle connection that is still fresh.
    /// Stale ones encountered on the way are dropped, which closes them.
    fn checkout_idle(&self) -> Option<MultiplexedConnection> {
        let mut idle = self.idle.lock().expect("pool idle list poisoned");
        while let Some(entry) = idle.pop_front() {
            if entry.since.elapsed() < self.cfg.idle_timeout {
                return Some(entry.conn);
            }
            tracing::debug!("discarding idle cache connection past idle timeout");
        }
        None
    }

    async fn dial(&self) -> Result<MultiplexedConnection> {
        let conn_cfg = AsyncConnectionConfig::new()
            .set_connection_timeout(self.cfg.connect_timeout)
            .set_response_timeout(self.cfg.response_timeout);

        self.client
            .get_multiplexed_async_connection_with_config(&conn_cfg)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "cache dial failed");
                CacheError::internal(e)
            })
    }

    fn release(&self, conn: MultiplexedConnection, broken: bool) {
        if broken {
            tracing::debug!("closing broken cache connection");
            return;
        }

        let mut idle = self.idle.lock().expect("pool idle list poisoned");
        if idle.len() < self.cfg.max_idle {
            idle.push_front(IdleConn {
                conn,
                since: Instant::now(),
            });
        }
        // Beyond max_idle the connection is simply dropped, which closes it.
    }
}

/// Exclusive checkout of one connection for the duration of one command.
///
/// Dropping the guard releases the connection on every exit path; the permit
/// held alongside it wakes one suspended acquirer.
pub struct PooledConn {
    conn: Option<MultiplexedConnection>,
    pool: Arc<ConnectionPool>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConn {
    fn new(
        pool: Arc<ConnectionPool>,
        conn: MultiplexedConnection,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            conn: Some(conn),
            pool,
            broken: false,
            _permit: permit,
        }
    }

    /// Mark the connection unusable; it will be closed instead of pooled.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub(crate) fn as_mut(&mut self) -> &mut MultiplexedConnection {
        self.conn
            .as_mut()
            .expect("connection present until guard drops")
    }
}

impl fmt::Debug for PooledConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConn")
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.broken);
        }
    }
}
