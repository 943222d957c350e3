//! # Client Errors
//!
//! Failures raised by the Redis connection and the pool. The facade passes
//! these through unchanged.

use redis::{ErrorKind, RedisError};
use thiserror::Error;

/// Result type for the client crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by connections, the pool, and typed commands.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport, protocol or server error reported by the Redis client.
    #[error("redis error: {0}")]
    Redis(#[from] RedisError),
    /// Pool is at capacity and no connection was released in time.
    #[error("connection pool exhausted")]
    PoolExhausted,
    /// A configuration value could not be parsed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Returns true when the failure leaves the connection in an unknown state.
    ///
    /// Server error replies are complete frames, so the socket stays usable.
    pub fn poisons_connection(&self) -> bool {
        match self {
            ClientError::Redis(err) => leaves_connection_unusable(err),
            _ => false,
        }
    }

    /// The server's error code (`ERR`, `WRONGTYPE`, ...) for error replies.
    pub fn server_code(&self) -> Option<&str> {
        match self {
            ClientError::Redis(err) => err.code(),
            _ => None,
        }
    }
}

/// A half-read or dropped reply would desync the next caller.
pub(crate) fn leaves_connection_unusable(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.kind() == ErrorKind::ParseError
}
