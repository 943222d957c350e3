//! # KV Facade
//!
//! Typed string and hash access to a Redis-compatible store, with JSON
//! marshaling for structured values. Connections come from any
//! [`kvf_client::ConnectionProvider`]; the facade only borrows them.

mod codec;
mod error;
mod facade;
mod validate;

pub use error::{InvalidArgument, KvError, KvResult, SerializationError};
pub use facade::KvFacade;
