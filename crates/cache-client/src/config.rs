//! # Cache Configuration
//!
//! Environment-based configuration for the pooled cache client.

use std::env;
use std::time::Duration;

/// Cache client configuration.
///
/// Supplied once at construction and never mutated afterwards. Pool sizing
/// and timeouts are fixed for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Store address as `host:port`
    pub addr: String,

    /// Optional credential, sent once per new connection
    pub password: Option<String>,

    /// Optional logical database selector, applied once per new connection
    pub db: Option<i64>,

    /// Dial timeout for new connections
    pub connect_timeout: Duration,

    /// Reply timeout for issued commands
    pub read_timeout: Duration,

    /// Write timeout; the async transport bounds the whole round trip with
    /// the response timeout, so this folds into the same bound
    pub write_timeout: Duration,

    /// Idle connections retained beyond this count are closed on release
    pub max_idle: usize,

    /// Upper bound on concurrently checked-out connections; 0 means unlimited
    pub max_active: usize,

    /// An idle connection older than this is discarded on next acquisition
    pub idle_timeout: Duration,
}

impl CacheConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            addr: env::var("CACHE_ADDR").unwrap_or(defaults.addr),
            password: env::var("CACHE_PASSWORD").ok().filter(|p| !p.is_empty()),
            db: env::var("CACHE_DB").ok().and_then(|v| v.parse().ok()),
            connect_timeout: secs_var("CACHE_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            read_timeout: secs_var("CACHE_READ_TIMEOUT_SECS", defaults.read_timeout),
            write_timeout: secs_var("CACHE_WRITE_TIMEOUT_SECS", defaults.write_timeout),
            max_idle: usize_var("CACHE_MAX_IDLE", defaults.max_idle),
            max_active: usize_var("CACHE_MAX_ACTIVE", defaults.max_active),
            idle_timeout: secs_var("CACHE_IDLE_TIMEOUT_SECS", defaults.idle_timeout),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".to_string(),
            password: None,
            db: None,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            max_idle: 8,
            max_active: 64,
            idle_timeout: Duration::from_secs(240),
        }
    }
}

fn secs_var(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_secs)
}

fn usize_var(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
