//! # KV Facade In-Memory Store
//!
//! A Redis-compatible keyspace that lives in the current process, exposed
//! through the same `ConnectionProvider` seam as the Redis pool.

mod dispatch;
mod engine;
mod memory;
mod provider;

pub use dispatch::dispatch_command;
pub use engine::{EngineError, EngineResult, KVEngine, TtlStatus};
pub use memory::MemoryEngine;
pub use provider::{MemoryConnection, MemoryProvider, ProviderStats};
