//! Cache layer error types.

use thiserror::Error;

/// Fixed origin code identifying the cache layer in wrapped errors, so
/// upstream error reporting can attribute failures without string inspection.
pub const CACHE_ERR_CODE: u32 = 1050;

/// Cache layer errors.
///
/// A missing key is never represented here: point lookups report it as
/// `Ok(None)` and absorbing operations as a zero value. Every variant is a
/// real failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store reported a failure, or the transport broke mid-command.
    /// Carries the raw driver error as the cause for diagnostics.
    #[error("cache internal error [{code}]: {source}")]
    Internal {
        code: u32,
        #[source]
        source: redis::RedisError,
    },

    /// The configured address or connection parameters were rejected.
    #[error("invalid cache configuration for '{addr}': {reason}")]
    Config { addr: String, reason: String },
}

impl CacheError {
    pub(crate) fn internal(err: redis::RedisError) -> Self {
        Self::Internal {
            code: CACHE_ERR_CODE,
            source: err,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
