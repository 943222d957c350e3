//! # Facade Errors
//!
//! The facade raises two kinds of its own, each with its own type:
//!
//! - [`InvalidArgument`]: a required text argument was empty or blank. This
//!   is a caller bug, detected before any connection is taken.
//! - [`SerializationError`]: a value could not be encoded to JSON, or stored
//!   text could not be decoded into the requested type.
//!
//! Everything else is a [`ClientError`] from the connection layer, passed
//! through untouched.

use kvf_client::ClientError;
use thiserror::Error;

/// Result type for facade operations.
pub type KvResult<T> = Result<T, KvError>;

/// A required argument was empty or whitespace-only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{argument} must not be empty or blank")]
pub struct InvalidArgument {
    /// Name of the rejected argument (`key`, `field` or `value`).
    pub argument: &'static str,
}

/// JSON encoding or decoding failed.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SerializationError {
    message: String,
    #[source]
    source: Option<serde_json::Error>,
}

impl SerializationError {
    pub(crate) fn new(message: impl Into<String>, source: Option<serde_json::Error>) -> Self {
        SerializationError {
            message: message.into(),
            source,
        }
    }

    /// Human-readable description of what could not be converted.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying codec error, absent when there was no text to decode.
    pub fn codec_error(&self) -> Option<&serde_json::Error> {
        self.source.as_ref()
    }
}

/// Any failure a facade call can return.
#[derive(Debug, Error)]
pub enum KvError {
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    /// Transport, pool or server failure from the client layer.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl KvError {
    /// Returns true for caller-side argument errors.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, KvError::InvalidArgument(_))
    }

    /// Returns true for JSON encode/decode errors.
    pub fn is_serialization(&self) -> bool {
        matches!(self, KvError::Serialization(_))
    }
}
