//! Storage trait shared by in-process backends.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine failures that map onto Redis error replies.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// The key does not exist (or has expired).
    #[error("no such key")]
    NotFound,
    /// The key holds a different data type than the command expects.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    /// The expiry lies beyond what the clock can represent.
    #[error("invalid expire time")]
    InvalidExpire,
}

/// TTL state for a key, mirroring Redis semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

/// String and hash operations over a keyspace with per-key TTL.
pub trait KVEngine: Send + Sync {
    /// Reads a string value. Hash keys fail with `WrongType`.
    fn get(&self, key: &[u8]) -> EngineResult<Option<Arc<[u8]>>>;

    /// Stores a string value, replacing any previous value and TTL.
    ///
    /// Nothing is written when `ttl` cannot be represented.
    fn set(&self, key: Vec<u8>, value: Vec<u8>, ttl: Option<Duration>) -> EngineResult<()>;

    /// Removes a key of any type. Returns whether a live key was removed.
    fn delete(&self, key: &[u8]) -> EngineResult<bool>;

    /// Returns whether a live key exists.
    fn exists(&self, key: &[u8]) -> EngineResult<bool>;

    /// Attaches a TTL to an existing key. Fails with `InvalidExpire` when the
    /// deadline would overflow.
    fn expire(&self, key: &[u8], ttl: Duration) -> EngineResult<()>;

    /// Reports the TTL state of a key.
    fn ttl(&self, key: &[u8]) -> EngineResult<TtlStatus>;

    /// Sets one hash field. Returns true when the field did not exist before.
    fn hset(&self, key: &[u8], field: Vec<u8>, value: Vec<u8>) -> EngineResult<bool>;

    /// Reads one hash field.
    fn hget(&self, key: &[u8], field: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Removes one hash field. Returns true when it existed.
    fn hdel(&self, key: &[u8], field: &[u8]) -> EngineResult<bool>;
}
