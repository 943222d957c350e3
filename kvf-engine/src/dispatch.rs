//! # Command Dispatch
//!
//! Translate one Redis command into engine calls and build the reply a Redis
//! server would send. Used by `MemoryProvider` so that facades talk to the
//! in-process store through the same command/reply contract as the network.

use std::time::Duration;

use redis::{ErrorKind, RedisError, RedisResult, Value};

use crate::engine::{EngineError, KVEngine, TtlStatus};

/// Executes a single command against `engine`.
///
/// Error replies come back as `Err`, shaped like the errors the `redis` crate
/// builds from a server's `-ERR` and `-WRONGTYPE` lines.
pub fn dispatch_command<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    let Some(cmd) = args.first() else {
        return Err(server_error("empty command".to_string()));
    };

    if cmd.eq_ignore_ascii_case(b"PING") {
        return handle_ping(args);
    }
    if cmd.eq_ignore_ascii_case(b"GET") {
        return handle_get(args, engine);
    }
    if cmd.eq_ignore_ascii_case(b"SET") {
        return handle_set(args, engine);
    }
    if cmd.eq_ignore_ascii_case(b"DEL") {
        return handle_del(args, engine);
    }
    if cmd.eq_ignore_ascii_case(b"EXISTS") {
        return handle_exists(args, engine);
    }
    if cmd.eq_ignore_ascii_case(b"EXPIRE") {
        return handle_expire(args, engine);
    }
    if cmd.eq_ignore_ascii_case(b"TTL") {
        return handle_ttl(args, engine);
    }
    if cmd.eq_ignore_ascii_case(b"HSET") {
        return handle_hset(args, engine);
    }
    if cmd.eq_ignore_ascii_case(b"HGET") {
        return handle_hget(args, engine);
    }
    if cmd.eq_ignore_ascii_case(b"HDEL") {
        return handle_hdel(args, engine);
    }

    Err(server_error(format!(
        "unknown command '{}'",
        String::from_utf8_lossy(cmd)
    )))
}

fn handle_ping(args: &[Vec<u8>]) -> RedisResult<Value> {
    match args.len() {
        1 => Ok(Value::SimpleString("PONG".to_string())),
        2 => Ok(Value::BulkString(args[1].clone())),
        _ => Err(arity_error("ping")),
    }
}

fn handle_get<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    if args.len() != 2 {
        return Err(arity_error("get"));
    }
    match engine.get(&args[1]) {
        Ok(Some(value)) => Ok(Value::BulkString(value.to_vec())),
        Ok(None) => Ok(Value::Nil),
        Err(err) => Err(engine_error(err, "get")),
    }
}

fn handle_set<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    let ttl = match args.len() {
        3 => None,
        5 if args[3].eq_ignore_ascii_case(b"EX") => match parse_i64(&args[4]) {
            Some(seconds) if seconds > 0 => Some(Duration::from_secs(seconds as u64)),
            Some(_) => return Err(engine_error(EngineError::InvalidExpire, "set")),
            None => return Err(not_an_integer()),
        },
        n if n < 3 => return Err(arity_error("set")),
        _ => return Err(server_error("syntax error".to_string())),
    };

    engine
        .set(args[1].clone(), args[2].clone(), ttl)
        .map_err(|err| engine_error(err, "set"))?;
    Ok(Value::Okay)
}

fn handle_del<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    if args.len() < 2 {
        return Err(arity_error("del"));
    }

    let mut removed = 0i64;
    for key in &args[1..] {
        if engine.delete(key).map_err(|err| engine_error(err, "del"))? {
            removed += 1;
        }
    }
    Ok(Value::Int(removed))
}

fn handle_exists<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    if args.len() < 2 {
        return Err(arity_error("exists"));
    }

    let mut found = 0i64;
    for key in &args[1..] {
        if engine.exists(key).map_err(|err| engine_error(err, "exists"))? {
            found += 1;
        }
    }
    Ok(Value::Int(found))
}

/// Non-positive TTLs delete the key immediately, as Redis does.
fn handle_expire<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    if args.len() != 3 {
        return Err(arity_error("expire"));
    }
    let Some(seconds) = parse_i64(&args[2]) else {
        return Err(not_an_integer());
    };

    if seconds <= 0 {
        let removed = engine
            .delete(&args[1])
            .map_err(|err| engine_error(err, "expire"))?;
        return Ok(Value::Int(removed as i64));
    }

    match engine.expire(&args[1], Duration::from_secs(seconds as u64)) {
        Ok(()) => Ok(Value::Int(1)),
        Err(EngineError::NotFound) => Ok(Value::Int(0)),
        Err(err) => Err(engine_error(err, "expire")),
    }
}

fn handle_ttl<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    if args.len() != 2 {
        return Err(arity_error("ttl"));
    }

    match engine.ttl(&args[1]) {
        Ok(TtlStatus::Missing) => Ok(Value::Int(-2)),
        Ok(TtlStatus::NoExpiry) => Ok(Value::Int(-1)),
        // Round to the nearest second like the Redis TTL command.
        Ok(TtlStatus::ExpiresIn(remaining)) => {
            let seconds = (remaining.as_millis() + 500) / 1000;
            Ok(Value::Int(i64::try_from(seconds).unwrap_or(i64::MAX)))
        }
        Err(err) => Err(engine_error(err, "ttl")),
    }
}

fn handle_hset<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(arity_error("hset"));
    }

    let mut created = 0i64;
    for pair in args[2..].chunks_exact(2) {
        let is_new = engine
            .hset(&args[1], pair[0].clone(), pair[1].clone())
            .map_err(|err| engine_error(err, "hset"))?;
        if is_new {
            created += 1;
        }
    }
    Ok(Value::Int(created))
}

fn handle_hget<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    if args.len() != 3 {
        return Err(arity_error("hget"));
    }
    match engine.hget(&args[1], &args[2]) {
        Ok(Some(value)) => Ok(Value::BulkString(value)),
        Ok(None) => Ok(Value::Nil),
        Err(err) => Err(engine_error(err, "hget")),
    }
}

fn handle_hdel<E: KVEngine + ?Sized>(args: &[Vec<u8>], engine: &E) -> RedisResult<Value> {
    if args.len() < 3 {
        return Err(arity_error("hdel"));
    }

    let mut removed = 0i64;
    for field in &args[2..] {
        if engine
            .hdel(&args[1], field)
            .map_err(|err| engine_error(err, "hdel"))?
        {
            removed += 1;
        }
    }
    Ok(Value::Int(removed))
}

fn engine_error(err: EngineError, command: &str) -> RedisError {
    match err {
        EngineError::WrongType => RedisError::from((
            ErrorKind::ExtensionError,
            "WRONGTYPE",
            "Operation against a key holding the wrong kind of value".to_string(),
        )),
        EngineError::InvalidExpire => {
            server_error(format!("invalid expire time in '{}' command", command))
        }
        EngineError::NotFound => server_error("no such key".to_string()),
    }
}

fn server_error(message: String) -> RedisError {
    RedisError::from((
        ErrorKind::ResponseError,
        "An error was signalled by the server",
        message,
    ))
}

fn arity_error(command: &str) -> RedisError {
    server_error(format!("wrong number of arguments for '{}' command", command))
}

fn not_an_integer() -> RedisError {
    server_error("value is not an integer or out of range".to_string())
}

fn parse_i64(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}
