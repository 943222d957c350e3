//! # Key-Value Facade
//!
//! Purpose: Typed string and hash operations over any `ConnectionProvider`,
//! with optional JSON marshaling of values.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KvFacade` hides leasing and reply decoding.
//! 2. **One Round Trip**: Each call leases one connection, issues exactly one
//!    command and releases it before returning, on success or failure.
//! 3. **Fail Before I/O**: Validation and encoding happen before a lease is taken.
//! 4. **Raw Store Semantics**: Counters and TTL sentinels are returned as the
//!    store reports them.
//!
//! ## Validation
//!
//! Only the writes check their text arguments: `set_string` checks key and
//! value, `hash_set_string` checks field and value. Reads, deletes, `expire`
//! and `ttl` send the key as given, and the outer key of hash writes is not
//! checked.

use kvf_client::{commands, ClientResult, ConnectionProvider, Lease};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::error::KvResult;
use crate::validate::ensure_not_blank;

/// Typed facade over a pooled key/value store.
///
/// The facade borrows connections from `provider` and never manages its
/// lifecycle. Pass a `ConnectionPool` clone, an `Arc<_>`, or a `&_` to keep
/// ownership with the caller.
///
/// ```no_run
/// use kvf_client::{ConnectionPool, PoolConfig};
/// use kvf_facade::KvFacade;
///
/// let pool = ConnectionPool::new(PoolConfig::default())?;
/// let kv = KvFacade::new(&pool);
/// kv.set_string("greeting", "hello")?;
/// assert_eq!(kv.get_string("greeting")?.as_deref(), Some("hello"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct KvFacade<P> {
    provider: P,
}

impl<P: ConnectionProvider> KvFacade<P> {
    /// Wraps a connection provider.
    pub fn new(provider: P) -> Self {
        KvFacade { provider }
    }

    /// The injected connection provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn lease(&self) -> ClientResult<Lease<'_, P>> {
        Lease::acquire(&self.provider)
    }

    /// Stores a string value. Returns the store's status reply, normally `OK`.
    ///
    /// # Errors
    /// `InvalidArgument` if `key` or `value` is blank; no connection is taken.
    pub fn set_string(&self, key: &str, value: &str) -> KvResult<String> {
        ensure_not_blank("key", key)?;
        ensure_not_blank("value", value)?;
        let mut conn = self.lease()?;
        Ok(commands::set(&mut conn, key, value)?)
    }

    /// Stores `value` encoded as JSON.
    ///
    /// # Errors
    /// `Serialization` if encoding fails; no connection is taken.
    pub fn set_object<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> KvResult<String> {
        let text = codec::encode(value)?;
        self.set_string(key, &text)
    }

    /// Reads a string value, `None` when the key does not exist.
    pub fn get_string(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.lease()?;
        Ok(commands::get(&mut conn, key)?)
    }

    /// Reads and decodes a JSON value into `T`.
    ///
    /// Use `serde_json::Value` as `T` (or [`get_json`](Self::get_json)) when
    /// the shape is not known up front.
    ///
    /// # Errors
    /// `Serialization` if the key is absent or its text does not decode as `T`.
    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> KvResult<T> {
        let text = self.get_string(key)?;
        Ok(codec::decode(text.as_deref())?)
    }

    /// Reads a JSON value without a target type.
    pub fn get_json(&self, key: &str) -> KvResult<serde_json::Value> {
        self.get_object(key)
    }

    /// Removes `key`. Returns true when a key was removed.
    pub fn delete(&self, key: &str) -> KvResult<bool> {
        self.remove_key_entirely(key)
    }

    /// Removes `key` whatever its type, hash keys included.
    pub fn remove_key_entirely(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.lease()?;
        Ok(commands::del(&mut conn, key)? > 0)
    }

    /// Sets or refreshes the TTL of `key`.
    ///
    /// Returns the raw reply: `1` when the TTL was set, `0` when the key does
    /// not exist. A non-positive `seconds` deletes the key.
    pub fn expire(&self, key: &str, seconds: i64) -> KvResult<i64> {
        let mut conn = self.lease()?;
        Ok(commands::expire(&mut conn, key, seconds)?)
    }

    /// Remaining TTL in seconds; `-1` means no expiry, `-2` means no such key.
    pub fn ttl(&self, key: &str) -> KvResult<i64> {
        let mut conn = self.lease()?;
        Ok(commands::ttl(&mut conn, key)?)
    }

    /// Sets one hash field. Returns `1` if the field is new, `0` if it was
    /// overwritten.
    ///
    /// # Errors
    /// `InvalidArgument` if `field` or `value` is blank; no connection is taken.
    pub fn hash_set_string(&self, key: &str, field: &str, value: &str) -> KvResult<i64> {
        ensure_not_blank("field", field)?;
        ensure_not_blank("value", value)?;
        let mut conn = self.lease()?;
        Ok(commands::hset(&mut conn, key, field, value)?)
    }

    /// Sets one hash field to `value` encoded as JSON.
    pub fn hash_set_object<T: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &T,
    ) -> KvResult<i64> {
        let text = codec::encode(value)?;
        self.hash_set_string(key, field, &text)
    }

    /// Reads one hash field, `None` when the key or field is missing.
    pub fn hash_get_string(&self, key: &str, field: &str) -> KvResult<Option<String>> {
        let mut conn = self.lease()?;
        Ok(commands::hget(&mut conn, key, field)?)
    }

    /// Reads and decodes one hash field into `T`.
    pub fn hash_get_object<T: DeserializeOwned>(&self, key: &str, field: &str) -> KvResult<T> {
        let text = self.hash_get_string(key, field)?;
        Ok(codec::decode(text.as_deref())?)
    }

    /// Reads one hash field as an untyped JSON value.
    pub fn hash_get_json(&self, key: &str, field: &str) -> KvResult<serde_json::Value> {
        self.hash_get_object(key, field)
    }

    /// Removes one hash field. Returns true when the field existed.
    pub fn hash_delete_field(&self, key: &str, field: &str) -> KvResult<bool> {
        let mut conn = self.lease()?;
        Ok(commands::hdel(&mut conn, key, field)? > 0)
    }

    /// Removes the whole key holding the hash, not just its fields.
    ///
    /// Same as [`remove_key_entirely`](Self::remove_key_entirely).
    pub fn hash_delete_all(&self, key: &str) -> KvResult<bool> {
        self.remove_key_entirely(key)
    }
}
