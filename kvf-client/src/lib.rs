//! # KV Facade Sync Client
//!
//! Purpose: Lend pooled Redis connections to callers one command at a time.
//! The wire protocol is handled by the `redis` crate; this crate owns pooling,
//! the provider seam and the typed commands the facade issues.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse connections to avoid repeated connects.
//! 2. **Injected Capability**: Callers depend on `ConnectionProvider`, never on
//!    sockets, so in-process stores can stand in for a server.
//! 3. **One Command, One Reply**: Commands are built with `redis::cmd` and run
//!    on any `redis::ConnectionLike`.

pub mod commands;
mod config;
mod error;
mod pool;

pub use config::PoolConfig;
pub use error::{ClientError, ClientResult};
pub use pool::{ConnectionPool, ConnectionProvider, Lease, RedisConnection};
pub use redis::{ConnectionLike, ErrorKind, RedisError, RedisResult, Value};
