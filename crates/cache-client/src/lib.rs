//! # Cache Client Library
//!
//! Pooled client for a remote in-memory data-structure store (strings,
//! hashes, sorted sets, sets, lists). Many concurrent callers multiplex
//! over a bounded set of persistent connections; replies are decoded into
//! typed results; and "key absent" is kept distinct from "operation failed"
//! so cache-miss logic never has to treat a miss as an error.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Calling Service                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  typed operations
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CacheClient                            │
//! │        (command executor + typed reply decoding)             │
//! └─────────────────────────────────────────────────────────────┘
//!            │ acquire / release              │ classify
//!            ▼                                ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │     ConnectionPool      │   │      Error Classifier        │
//! │ (bounded, blocking wait)│   │ Success / KeyNotFound / Err  │
//! └─────────────────────────┘   └──────────────────────────────┘
//!            │ one command per checkout
//!            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Store (request/reply)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Miss handling
//!
//! Point lookups (`get`, `hget`, `zscore`, ...) report an absent key as
//! `Ok(None)` so the caller decides what a miss means. The queue-draining
//! operations (`lpop`, `lpop_string`, `llen`, `keys`) absorb the miss into
//! a zero/empty result, since "nothing there yet" is their steady state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cache_client::{CacheClient, CacheConfig};
//!
//! let client = CacheClient::new(CacheConfig::from_env())?;
//! client.set("greeting", "hello", 30).await?;
//! let cached = client.get_string("greeting").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod pool;

// Re-export commonly used types
pub use classify::{classify, Outcome};
pub use client::{shared_cache, CacheClient, SharedCacheClient};
pub use config::CacheConfig;
pub use error::{CacheError, Result, CACHE_ERR_CODE};
pub use pool::{ConnectionPool, PoolConfig, PooledConn};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
