//! # Connection Pool
//!
//! Purpose: Lend connections to callers one command at a time and take them
//! back on every exit path, so facades never own a socket.
//!
//! ## Design Principles
//! 1. **Capability Traits**: `ConnectionProvider` is the only thing callers
//!    depend on; the Redis pool and in-process fakes both implement it.
//! 2. **RAII Leases**: `Lease` releases its connection in `Drop`, covering
//!    early returns, `?` and panics alike.
//! 3. **Minimal Locking**: Hold the mutex only while moving idle connections.
//! 4. **Bounded Wait**: A full pool waits for `acquire_timeout`, or fails fast.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use redis::{Client, ConnectionLike, ErrorKind, RedisError, RedisResult, Value};

use crate::config::{non_zero, PoolConfig};
use crate::error::{leaves_connection_unusable, ClientError, ClientResult};

/// Source of connections.
///
/// Every successful `acquire` must be paired with exactly one `release`.
/// Prefer [`Lease`], which does the pairing automatically.
pub trait ConnectionProvider: Send + Sync {
    type Conn: ConnectionLike;

    /// Borrows a connection, opening one if none is idle.
    fn acquire(&self) -> ClientResult<Self::Conn>;

    /// Returns a borrowed connection.
    fn release(&self, conn: Self::Conn);
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for &P {
    type Conn = P::Conn;

    fn acquire(&self) -> ClientResult<Self::Conn> {
        (**self).acquire()
    }

    fn release(&self, conn: Self::Conn) {
        (**self).release(conn)
    }
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for Arc<P> {
    type Conn = P::Conn;

    fn acquire(&self) -> ClientResult<Self::Conn> {
        (**self).acquire()
    }

    fn release(&self, conn: Self::Conn) {
        (**self).release(conn)
    }
}

/// RAII handle for one borrowed connection.
///
/// A lease is itself a `ConnectionLike`, so `redis::cmd(..).query(&mut lease)`
/// runs on the borrowed connection.
pub struct Lease<'a, P: ConnectionProvider + ?Sized> {
    provider: &'a P,
    conn: Option<P::Conn>,
}

impl<'a, P: ConnectionProvider + ?Sized> Lease<'a, P> {
    /// Acquires a connection from `provider`.
    pub fn acquire(provider: &'a P) -> ClientResult<Self> {
        let conn = provider.acquire()?;
        Ok(Lease {
            provider,
            conn: Some(conn),
        })
    }

    fn conn(&mut self) -> RedisResult<&mut P::Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| RedisError::from((ErrorKind::ClientError, "connection already released")))
    }
}

impl<P: ConnectionProvider + ?Sized> ConnectionLike for Lease<'_, P> {
    fn req_packed_command(&mut self, cmd: &[u8]) -> RedisResult<Value> {
        tracing::trace!(bytes = cmd.len(), "exec");
        self.conn()?.req_packed_command(cmd)
    }

    fn req_packed_commands(
        &mut self,
        cmd: &[u8],
        offset: usize,
        count: usize,
    ) -> RedisResult<Vec<Value>> {
        self.conn()?.req_packed_commands(cmd, offset, count)
    }

    fn get_db(&self) -> i64 {
        self.conn.as_ref().map(|conn| conn.get_db()).unwrap_or(0)
    }

    fn check_connection(&mut self) -> bool {
        self.conn.as_mut().map(|conn| conn.check_connection()).unwrap_or(false)
    }

    fn is_open(&self) -> bool {
        self.conn.as_ref().map(|conn| conn.is_open()).unwrap_or(false)
    }
}

impl<P: ConnectionProvider + ?Sized> Drop for Lease<'_, P> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.provider.release(conn);
        }
    }
}

/// A pooled Redis connection that remembers whether it is still in sync.
pub struct RedisConnection {
    inner: redis::Connection,
    valid: bool,
}

impl RedisConnection {
    fn track<T>(&mut self, result: RedisResult<T>) -> RedisResult<T> {
        if let Err(err) = &result {
            if leaves_connection_unusable(err) {
                self.valid = false;
            }
        }
        result
    }

    /// Whether the connection may go back to the idle set after use.
    pub fn is_reusable(&self) -> bool {
        self.valid && self.inner.is_open()
    }
}

impl ConnectionLike for RedisConnection {
    fn req_packed_command(&mut self, cmd: &[u8]) -> RedisResult<Value> {
        let result = self.inner.req_packed_command(cmd);
        self.track(result)
    }

    fn req_packed_commands(
        &mut self,
        cmd: &[u8],
        offset: usize,
        count: usize,
    ) -> RedisResult<Vec<Value>> {
        let result = self.inner.req_packed_commands(cmd, offset, count);
        self.track(result)
    }

    fn get_db(&self) -> i64 {
        self.inner.get_db()
    }

    fn check_connection(&mut self) -> bool {
        self.inner.check_connection()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

struct PoolState {
    idle: VecDeque<RedisConnection>,
    total: usize,
}

struct PoolInner {
    config: PoolConfig,
    client: Client,
    state: Mutex<PoolState>,
    // Signalled whenever a slot or idle connection frees up.
    available: Condvar,
}

/// Bounded pool of Redis connections.
///
/// Cloning is cheap and clones share the same connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a new connection pool with the provided configuration.
    ///
    /// The URL is validated here; no connection is opened until the first
    /// `acquire`.
    pub fn new(config: PoolConfig) -> ClientResult<Self> {
        if config.max_total == 0 {
            return Err(ClientError::InvalidConfig("max_total must be at least 1".into()));
        }
        let client = Client::open(config.url.as_str())?;

        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            total: 0,
        };
        Ok(ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                client,
                state: Mutex::new(state),
                available: Condvar::new(),
            }),
        })
    }

    /// Returns the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Number of idle connections currently parked in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Number of open connections, idle or leased.
    pub fn total_count(&self) -> usize {
        self.inner.state.lock().total
    }

    /// Pops an idle connection or reserves a slot for a new one, waiting for
    /// `acquire_timeout` when the pool is full.
    fn checkout(&self) -> ClientResult<Option<RedisConnection>> {
        let config = &self.inner.config;
        // `Some(None)` waits without a deadline: the timeout is past what `Instant` can hold.
        let deadline =
            non_zero(config.acquire_timeout).map(|timeout| Instant::now().checked_add(timeout));
        let mut state = self.inner.state.lock();

        loop {
            if let Some(conn) = state.idle.pop_front() {
                return Ok(Some(conn));
            }
            if state.total < config.max_total {
                state.total += 1;
                return Ok(None);
            }

            let deadline = deadline.ok_or(ClientError::PoolExhausted)?;
            let Some(deadline) = deadline else {
                self.inner.available.wait(&mut state);
                continue;
            };
            if self
                .inner
                .available
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                // A release may have raced the timeout.
                if let Some(conn) = state.idle.pop_front() {
                    return Ok(Some(conn));
                }
                if state.total < config.max_total {
                    state.total += 1;
                    return Ok(None);
                }
                return Err(ClientError::PoolExhausted);
            }
        }
    }

    fn connect(&self) -> ClientResult<RedisConnection> {
        let config = &self.inner.config;
        let conn = match non_zero(config.connect_timeout) {
            Some(timeout) => self.inner.client.get_connection_with_timeout(timeout)?,
            None => self.inner.client.get_connection()?,
        };
        conn.set_read_timeout(non_zero(config.read_timeout))?;
        conn.set_write_timeout(non_zero(config.write_timeout))?;
        Ok(RedisConnection {
            inner: conn,
            valid: true,
        })
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock();
        state.total = state.total.saturating_sub(1);
        drop(state);
        self.inner.available.notify_one();
    }
}

impl ConnectionProvider for ConnectionPool {
    type Conn = RedisConnection;

    fn acquire(&self) -> ClientResult<RedisConnection> {
        if let Some(conn) = self.checkout()? {
            return Ok(conn);
        }

        match self.connect() {
            Ok(conn) => {
                tracing::debug!(url = %self.inner.config.url, "opened connection");
                Ok(conn)
            }
            Err(err) => {
                self.release_slot();
                Err(err)
            }
        }
    }

    fn release(&self, conn: RedisConnection) {
        if !conn.is_reusable() {
            tracing::warn!(url = %self.inner.config.url, "discarding broken connection");
            self.release_slot();
            return;
        }

        let mut state = self.inner.state.lock();
        if state.idle.len() < self.inner.config.max_idle {
            state.idle.push_back(conn);
        } else {
            state.total = state.total.saturating_sub(1);
        }
        drop(state);
        self.inner.available.notify_one();
    }
}
