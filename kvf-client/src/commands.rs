//! # Typed Commands
//!
//! Purpose: One function per Redis command the facade needs, each issuing a
//! single round trip on a caller-supplied connection and mapping the reply to
//! a plain Rust value.
//!
//! Replies are returned in store-native form (status text, raw integers) so
//! callers see exactly what the server said.

use redis::ConnectionLike;

use crate::error::ClientResult;

/// Pings the server. Returns the status text, normally `PONG`.
pub fn ping(conn: &mut dyn ConnectionLike) -> ClientResult<String> {
    Ok(redis::cmd("PING").query(conn)?)
}

/// `SET key value`. Returns the status text, normally `OK`.
pub fn set(conn: &mut dyn ConnectionLike, key: &str, value: &str) -> ClientResult<String> {
    Ok(redis::cmd("SET").arg(key).arg(value).query(conn)?)
}

/// `GET key`. Returns `None` when the key is missing.
pub fn get(conn: &mut dyn ConnectionLike, key: &str) -> ClientResult<Option<String>> {
    Ok(redis::cmd("GET").arg(key).query(conn)?)
}

/// `DEL key`. Returns the number of keys removed.
pub fn del(conn: &mut dyn ConnectionLike, key: &str) -> ClientResult<i64> {
    Ok(redis::cmd("DEL").arg(key).query(conn)?)
}

/// `EXPIRE key seconds`. Returns 1 when the TTL was set, 0 when the key is absent.
pub fn expire(conn: &mut dyn ConnectionLike, key: &str, seconds: i64) -> ClientResult<i64> {
    Ok(redis::cmd("EXPIRE").arg(key).arg(seconds).query(conn)?)
}

/// `TTL key`. Returns remaining seconds, `-1` for no expiry, `-2` when absent.
pub fn ttl(conn: &mut dyn ConnectionLike, key: &str) -> ClientResult<i64> {
    Ok(redis::cmd("TTL").arg(key).query(conn)?)
}

/// `HSET key field value`. Returns 1 when the field is new, 0 on overwrite.
pub fn hset(conn: &mut dyn ConnectionLike, key: &str, field: &str, value: &str) -> ClientResult<i64> {
    Ok(redis::cmd("HSET").arg(key).arg(field).arg(value).query(conn)?)
}

/// `HGET key field`. Returns `None` when the key or field is missing.
pub fn hget(conn: &mut dyn ConnectionLike, key: &str, field: &str) -> ClientResult<Option<String>> {
    Ok(redis::cmd("HGET").arg(key).arg(field).query(conn)?)
}

/// `HDEL key field`. Returns the number of fields removed.
pub fn hdel(conn: &mut dyn ConnectionLike, key: &str, field: &str) -> ClientResult<i64> {
    Ok(redis::cmd("HDEL").arg(key).arg(field).query(conn)?)
}
