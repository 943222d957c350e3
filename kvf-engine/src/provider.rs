//! # In-Process Connection Provider
//!
//! `MemoryProvider` hands out connections that answer packed Redis commands
//! straight from a `MemoryEngine`, with no socket in between. It counts every
//! acquire, release and command so callers can check connection discipline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kvf_client::{ClientResult, ConnectionProvider};
use redis::{ConnectionLike, ErrorKind, RedisError, RedisResult, Value};

use crate::dispatch::dispatch_command;
use crate::memory::MemoryEngine;

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    commands: AtomicUsize,
}

/// Snapshot of provider counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderStats {
    pub acquired: usize,
    pub released: usize,
    pub commands: usize,
}

impl ProviderStats {
    /// Connections acquired but not yet released.
    pub fn in_flight(&self) -> usize {
        self.acquired.saturating_sub(self.released)
    }
}

/// Connection provider backed by an in-process engine.
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    engine: Arc<MemoryEngine>,
    counters: Arc<Counters>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// Creates a provider over a fresh engine.
    pub fn new() -> Self {
        Self::with_engine(Arc::new(MemoryEngine::new()))
    }

    /// Creates a provider over an existing engine, e.g. to share one keyspace.
    pub fn with_engine(engine: Arc<MemoryEngine>) -> Self {
        MemoryProvider {
            engine,
            counters: Arc::new(Counters::default()),
        }
    }

    /// The backing engine, for direct inspection.
    pub fn engine(&self) -> &Arc<MemoryEngine> {
        &self.engine
    }

    /// Current counter values.
    pub fn stats(&self) -> ProviderStats {
        ProviderStats {
            acquired: self.counters.acquired.load(Ordering::SeqCst),
            released: self.counters.released.load(Ordering::SeqCst),
            commands: self.counters.commands.load(Ordering::SeqCst),
        }
    }
}

/// A "connection" to the in-process engine.
pub struct MemoryConnection {
    engine: Arc<MemoryEngine>,
    counters: Arc<Counters>,
}

impl ConnectionLike for MemoryConnection {
    fn req_packed_command(&mut self, cmd: &[u8]) -> RedisResult<Value> {
        self.counters.commands.fetch_add(1, Ordering::SeqCst);
        let args = unpack_command(cmd)?;
        dispatch_command(&args, self.engine.as_ref())
    }

    fn req_packed_commands(&mut self, _: &[u8], _: usize, _: usize) -> RedisResult<Vec<Value>> {
        Err(RedisError::from((
            ErrorKind::ClientError,
            "pipelines are not supported by the in-memory store",
        )))
    }

    fn get_db(&self) -> i64 {
        0
    }

    fn check_connection(&mut self) -> bool {
        true
    }

    fn is_open(&self) -> bool {
        true
    }
}

/// Splits a packed command back into its arguments.
fn unpack_command(cmd: &[u8]) -> RedisResult<Vec<Vec<u8>>> {
    let malformed = || RedisError::from((ErrorKind::ClientError, "malformed packed command"));
    match redis::parse_redis_value(cmd)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::BulkString(data) => Ok(data),
                _ => Err(malformed()),
            })
            .collect(),
        _ => Err(malformed()),
    }
}

impl ConnectionProvider for MemoryProvider {
    type Conn = MemoryConnection;

    fn acquire(&self) -> ClientResult<MemoryConnection> {
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            engine: Arc::clone(&self.engine),
            counters: Arc::clone(&self.counters),
        })
    }

    fn release(&self, _conn: MemoryConnection) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}
