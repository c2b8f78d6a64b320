//! # Error Classifier
//!
//! Maps raw driver errors onto the tri-state outcome every operation shares:
//! success, key-not-found, or internal error. This module is the only place
//! allowed to recognize the protocol's "nothing to return" signal, so the
//! brittleness of that recognition stays contained and testable.

use redis::{ErrorKind, RedisError};

/// Classification of a command result.
///
/// `KeyNotFound` is not an application error: callers receive it as an
/// absent value, never as an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    KeyNotFound,
    InternalError,
}

/// Classify the raw error (if any) of a completed command.
pub fn classify(err: Option<&RedisError>) -> Outcome {
    match err {
        None => Outcome::Success,
        Some(e) if is_nil_reply(e) => Outcome::KeyNotFound,
        Some(_) => Outcome::InternalError,
    }
}

/// Whether a nil reply was coerced into a typed decode failure.
///
/// The primary miss path is typed: executors decode `Option<T>` and a nil
/// reply becomes `None` without ever reaching here. This fallback catches a
/// nil reply forced into a non-optional shape, which the driver reports as a
/// type error whose detail names the nil response.
fn is_nil_reply(err: &RedisError) -> bool {
    err.kind() == ErrorKind::TypeError
        && err
            .detail()
            .is_some_and(|d| d.to_ascii_lowercase().contains("response was nil"))
}

/// Whether a failed command leaves its connection unusable.
///
/// A connection that timed out or broke mid-reply may hold a half-read frame;
/// pooling it again would desynchronize the next command issued on it. Such
/// connections are closed instead of released to the idle set.
pub fn invalidates_connection(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_unrecoverable_error()
}
