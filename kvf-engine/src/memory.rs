//! # In-Memory Engine
//!
//! Provide an in-process Redis-compatible keyspace with sharded locking,
//! string and hash values, and TTL-aware lookups.
//!
//! ## Usage
//!
//! - Use `MemoryEngine::new()` for a default sharded engine.
//! - Use `MemoryEngine::with_shard_count` to pin the shard count in tests.
//! - Call `purge_expired` periodically if expired keys should be reclaimed
//!   without waiting for the next access.
//!
//! ## Design Principles
//!
//! 1. **Sharded Locks**: Per-shard locks reduce contention under concurrency.
//! 2. **Typed Entries**: Each key holds a string or a hash; commands against
//!    the wrong kind fail with `WrongType` like Redis.
//! 3. **Arc-backed Strings**: String values are `Arc<[u8]>` to avoid copies.
//! 4. **TTL Fast Path**: Expiration is checked on access for O(1) reads.
//! 5. **Strategy Pattern**: Implements `KVEngine` to keep callers decoupled.
//!
//! ## Structure Overview
//!
//! ```text
//! MemoryEngine
//!   └── shards: Vec<Shard>
//!         └── Shard
//!               └── map: RwLock<HashMap<Vec<u8>, Entry>>
//!                     └── Entry { value: Stored, expires_at }
//!                           └── Stored::Str(Arc<[u8]>) | Stored::Hash(HashMap)
//! ```

use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::engine::{EngineError, EngineResult, KVEngine, TtlStatus};

/// Default shards = CPU count * multiplier to reduce lock contention.
const DEFAULT_SHARD_MULTIPLIER: usize = 4;

type FieldMap = HashMap<Vec<u8>, Vec<u8>, RandomState>;
type ShardMap = HashMap<Vec<u8>, Entry, RandomState>;

#[derive(Debug)]
enum Stored {
    Str(Arc<[u8]>),
    Hash(FieldMap),
}

#[derive(Debug)]
struct Entry {
    value: Stored,
    // Absolute expiration timestamp.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

#[derive(Debug)]
struct Shard {
    map: RwLock<ShardMap>,
}

/// Returns the live entry for `key`, dropping it first if it has expired.
fn live_entry<'m>(map: &'m mut ShardMap, key: &[u8], now: Instant) -> Option<&'m mut Entry> {
    let expired = map.get(key).map(|entry| entry.is_expired(now))?;
    if expired {
        map.remove(key);
        return None;
    }
    map.get_mut(key)
}

fn deadline(now: Instant, ttl: Duration) -> EngineResult<Instant> {
    now.checked_add(ttl).ok_or(EngineError::InvalidExpire)
}

/// Sharded in-memory implementation of `KVEngine`.
#[derive(Debug)]
pub struct MemoryEngine {
    shards: Vec<Shard>,
    /// Bitmask for fast shard selection (power-of-two shard count).
    shard_mask: usize,
    /// Hash state used to pick shards and to seed per-shard maps.
    hash_state: RandomState,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates a new engine with a default shard count based on CPU parallelism.
    pub fn new() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::with_shard_count(threads.saturating_mul(DEFAULT_SHARD_MULTIPLIER))
    }

    /// Creates a new engine with a caller-provided shard count.
    ///
    /// The count is normalized to the next power of two to enable fast masking.
    pub fn with_shard_count(shards: usize) -> Self {
        let shard_count = shards.max(1).next_power_of_two();
        let hash_state = RandomState::new();
        let shards = (0..shard_count)
            .map(|_| Shard {
                map: RwLock::new(HashMap::with_hasher(hash_state.clone())),
            })
            .collect();

        MemoryEngine {
            shards,
            shard_mask: shard_count - 1,
            hash_state,
        }
    }

    /// Number of live keys across all shards.
    ///
    /// Expired keys that have not been touched since expiry are skipped.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.shards
            .iter()
            .map(|shard| shard.map.read().values().filter(|e| !e.is_expired(now)).count())
            .sum()
    }

    /// Returns true when no live key exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes expired entries across all shards.
    ///
    /// This is an O(n) scan intended for periodic sweeps.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut map = shard.map.write();
            let before = map.len();
            map.retain(|_, entry| !entry.is_expired(now));
            removed += before - map.len();
        }
        if removed > 0 {
            tracing::debug!(removed, "purged expired keys");
        }
        removed
    }

    fn shard_for(&self, key: &[u8]) -> &Shard {
        let mut hasher = self.hash_state.build_hasher();
        hasher.write(key);
        &self.shards[(hasher.finish() as usize) & self.shard_mask]
    }
}

impl KVEngine for MemoryEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Arc<[u8]>>> {
        let mut map = self.shard_for(key).map.write();
        match live_entry(&mut map, key, Instant::now()) {
            None => Ok(None),
            Some(Entry { value: Stored::Str(data), .. }) => Ok(Some(Arc::clone(data))),
            Some(_) => Err(EngineError::WrongType),
        }
    }

    /// Inserts or replaces a key. Any previous TTL or hash value is dropped.
    fn set(&self, key: Vec<u8>, value: Vec<u8>, ttl: Option<Duration>) -> EngineResult<()> {
        let expires_at = ttl.map(|ttl| deadline(Instant::now(), ttl)).transpose()?;
        let mut map = self.shard_for(&key).map.write();
        map.insert(
            key,
            Entry {
                value: Stored::Str(Arc::from(value)),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> EngineResult<bool> {
        let mut map = self.shard_for(key).map.write();
        // Expired entries are treated as missing to match Redis semantics.
        Ok(map
            .remove(key)
            .map(|entry| !entry.is_expired(Instant::now()))
            .unwrap_or(false))
    }

    fn exists(&self, key: &[u8]) -> EngineResult<bool> {
        let mut map = self.shard_for(key).map.write();
        Ok(live_entry(&mut map, key, Instant::now()).is_some())
    }

    fn expire(&self, key: &[u8], ttl: Duration) -> EngineResult<()> {
        let now = Instant::now();
        let mut map = self.shard_for(key).map.write();
        let entry = live_entry(&mut map, key, now).ok_or(EngineError::NotFound)?;
        entry.expires_at = Some(deadline(now, ttl)?);
        Ok(())
    }

    fn ttl(&self, key: &[u8]) -> EngineResult<TtlStatus> {
        let now = Instant::now();
        let mut map = self.shard_for(key).map.write();
        Ok(match live_entry(&mut map, key, now) {
            None => TtlStatus::Missing,
            Some(Entry { expires_at: None, .. }) => TtlStatus::NoExpiry,
            Some(Entry { expires_at: Some(deadline), .. }) => TtlStatus::ExpiresIn(*deadline - now),
        })
    }

    fn hset(&self, key: &[u8], field: Vec<u8>, value: Vec<u8>) -> EngineResult<bool> {
        let now = Instant::now();
        let mut map = self.shard_for(key).map.write();
        if live_entry(&mut map, key, now).is_none() {
            map.insert(
                key.to_vec(),
                Entry {
                    value: Stored::Hash(HashMap::with_hasher(self.hash_state.clone())),
                    expires_at: None,
                },
            );
        }

        match map.get_mut(key).map(|entry| &mut entry.value) {
            Some(Stored::Hash(fields)) => Ok(fields.insert(field, value).is_none()),
            _ => Err(EngineError::WrongType),
        }
    }

    fn hget(&self, key: &[u8], field: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let mut map = self.shard_for(key).map.write();
        match live_entry(&mut map, key, Instant::now()) {
            None => Ok(None),
            Some(Entry { value: Stored::Hash(fields), .. }) => Ok(fields.get(field).cloned()),
            Some(_) => Err(EngineError::WrongType),
        }
    }

    /// Removes a field; a hash left without fields is removed entirely.
    fn hdel(&self, key: &[u8], field: &[u8]) -> EngineResult<bool> {
        let mut map = self.shard_for(key).map.write();
        let (removed, now_empty) = match live_entry(&mut map, key, Instant::now()) {
            None => return Ok(false),
            Some(Entry { value: Stored::Hash(fields), .. }) => {
                let removed = fields.remove(field).is_some();
                (removed, fields.is_empty())
            }
            Some(_) => return Err(EngineError::WrongType),
        };
        if now_empty {
            map.remove(key);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let engine = MemoryEngine::with_shard_count(4);
        engine.set(b"alpha".to_vec(), b"value".to_vec(), None).unwrap();
        let value = engine.get(b"alpha").unwrap().unwrap();
        assert_eq!(&*value, b"value");
    }

    #[test]
    fn delete_removes_key() {
        let engine = MemoryEngine::with_shard_count(2);
        engine.set(b"alpha".to_vec(), b"value".to_vec(), None).unwrap();
        assert!(engine.delete(b"alpha").unwrap());
        assert!(!engine.delete(b"alpha").unwrap());
        assert!(engine.get(b"alpha").unwrap().is_none());
    }

    #[test]
    fn expire_hides_value() {
        let engine = MemoryEngine::with_shard_count(2);
        engine.set(b"alpha".to_vec(), b"value".to_vec(), None).unwrap();
        engine.expire(b"alpha", Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(engine.get(b"alpha").unwrap().is_none());
        assert_eq!(engine.expire(b"alpha", Duration::from_secs(1)), Err(EngineError::NotFound));
    }

    #[test]
    fn set_clears_previous_ttl() {
        let engine = MemoryEngine::with_shard_count(1);
        engine.set(b"alpha".to_vec(), b"1".to_vec(), None).unwrap();
        engine.expire(b"alpha", Duration::from_secs(60)).unwrap();
        engine.set(b"alpha".to_vec(), b"2".to_vec(), None).unwrap();
        assert_eq!(engine.ttl(b"alpha").unwrap(), TtlStatus::NoExpiry);
    }

    #[test]
    fn unrepresentable_ttl_is_rejected() {
        let engine = MemoryEngine::with_shard_count(1);
        let forever = Duration::from_secs(u64::MAX);
        engine.set(b"alpha".to_vec(), b"value".to_vec(), None).unwrap();

        assert_eq!(engine.expire(b"alpha", forever), Err(EngineError::InvalidExpire));
        assert_eq!(engine.ttl(b"alpha").unwrap(), TtlStatus::NoExpiry);

        assert_eq!(
            engine.set(b"beta".to_vec(), b"value".to_vec(), Some(forever)),
            Err(EngineError::InvalidExpire)
        );
        assert!(!engine.exists(b"beta").unwrap());
    }

    #[test]
    fn set_with_ttl_expires() {
        let engine = MemoryEngine::with_shard_count(1);
        engine
            .set(b"alpha".to_vec(), b"value".to_vec(), Some(Duration::from_millis(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(engine.get(b"alpha").unwrap().is_none());
    }

    #[test]
    fn purge_expired_removes_entries() {
        let engine = MemoryEngine::with_shard_count(2);
        engine.set(b"alpha".to_vec(), b"value".to_vec(), None).unwrap();
        engine.set(b"beta".to_vec(), b"value".to_vec(), None).unwrap();
        engine.expire(b"alpha", Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(engine.purge_expired(Instant::now()), 1);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn ttl_reports_missing_or_expiry() {
        let engine = MemoryEngine::with_shard_count(2);
        assert_eq!(engine.ttl(b"missing").unwrap(), TtlStatus::Missing);

        engine.set(b"alpha".to_vec(), b"value".to_vec(), None).unwrap();
        assert_eq!(engine.ttl(b"alpha").unwrap(), TtlStatus::NoExpiry);

        engine.expire(b"alpha", Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(engine.ttl(b"alpha").unwrap(), TtlStatus::Missing);
    }

    #[test]
    fn hash_fields_are_independent() {
        let engine = MemoryEngine::with_shard_count(2);
        assert!(engine.hset(b"user", b"name".to_vec(), b"ann".to_vec()).unwrap());
        assert!(engine.hset(b"user", b"age".to_vec(), b"7".to_vec()).unwrap());
        assert!(!engine.hset(b"user", b"age".to_vec(), b"8".to_vec()).unwrap());

        assert_eq!(engine.hget(b"user", b"age").unwrap(), Some(b"8".to_vec()));
        assert_eq!(engine.hget(b"user", b"missing").unwrap(), None);
        assert_eq!(engine.hget(b"nobody", b"name").unwrap(), None);
    }

    #[test]
    fn last_hdel_removes_key() {
        let engine = MemoryEngine::with_shard_count(1);
        engine.hset(b"user", b"name".to_vec(), b"ann".to_vec()).unwrap();
        assert!(engine.hdel(b"user", b"name").unwrap());
        assert!(!engine.hdel(b"user", b"name").unwrap());
        assert!(!engine.exists(b"user").unwrap());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let engine = MemoryEngine::with_shard_count(1);
        engine.set(b"plain".to_vec(), b"v".to_vec(), None).unwrap();
        engine.hset(b"hash", b"f".to_vec(), b"v".to_vec()).unwrap();

        assert_eq!(engine.hget(b"plain", b"f"), Err(EngineError::WrongType));
        assert_eq!(
            engine.hset(b"plain", b"f".to_vec(), b"v".to_vec()),
            Err(EngineError::WrongType)
        );
        assert_eq!(engine.get(b"hash").map(|v| v.is_some()), Err(EngineError::WrongType));
        assert!(engine.delete(b"hash").unwrap());
    }

    #[test]
    fn expired_hash_is_recreated_on_hset() {
        let engine = MemoryEngine::with_shard_count(1);
        engine.hset(b"user", b"old".to_vec(), b"1".to_vec()).unwrap();
        engine.expire(b"user", Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert!(engine.hset(b"user", b"new".to_vec(), b"2".to_vec()).unwrap());
        assert_eq!(engine.hget(b"user", b"old").unwrap(), None);
        assert_eq!(engine.ttl(b"user").unwrap(), TtlStatus::NoExpiry);
    }
}
