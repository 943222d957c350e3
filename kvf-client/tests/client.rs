use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kvf_client::{commands, ClientError, ConnectionPool, ConnectionProvider, Lease, PoolConfig};

/// Raw reply for the `idx`-th command seen by the server, or `None` to hang up.
type Handler = fn(usize, Vec<Vec<u8>>) -> Option<&'static [u8]>;

/// Commands a client may send while setting up a connection.
const SETUP_COMMANDS: [&[u8]; 4] = [b"CLIENT", b"HELLO", b"SELECT", b"AUTH"];

fn spawn_server(handler: Handler) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let seen = Arc::new(AtomicUsize::new(0));

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let seen = Arc::clone(&seen);
            thread::spawn(move || serve(stream, handler, seen));
        }
    });

    format!("redis://{}/", addr)
}

fn serve(mut stream: TcpStream, handler: Handler, seen: Arc<AtomicUsize>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));
    while let Ok(args) = read_command(&mut reader) {
        let is_setup = args
            .first()
            .map(|cmd| SETUP_COMMANDS.iter().any(|setup| cmd.eq_ignore_ascii_case(setup)))
            .unwrap_or(false);
        let reply = if is_setup {
            Some(&b"+OK\r\n"[..])
        } else {
            handler(seen.fetch_add(1, Ordering::SeqCst), args)
        };

        match reply {
            Some(bytes) => {
                if stream.write_all(bytes).and_then(|_| stream.flush()).is_err() {
                    return;
                }
            }
            None => {
                // Claim a large bulk reply, send a few bytes of it, then hang up.
                let _ = stream.write_all(b"$1048576\r\nabc");
                return;
            }
        }
    }
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<Vec<u8>>> {
    let mut line = Vec::new();
    read_line(reader, &mut line)?;
    if line.first() != Some(&b'*') {
        return Err(invalid("expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        read_line(reader, &mut line)?;
        if line.first() != Some(&b'$') {
            return Err(invalid("expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(invalid("missing crlf"));
        }
        data.truncate(len);
        args.push(data);
    }
    Ok(args)
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    }
    if !buf.ends_with(b"\r\n") {
        return Err(invalid("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| invalid("digit"))
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}

fn pool_with_url(url: String, max_total: usize) -> ConnectionPool {
    let config = PoolConfig {
        url,
        max_idle: max_total,
        max_total,
        read_timeout: Some(Duration::from_secs(1)),
        write_timeout: Some(Duration::from_secs(1)),
        connect_timeout: Some(Duration::from_secs(1)),
        acquire_timeout: None,
    };
    ConnectionPool::new(config).expect("pool")
}

#[test]
fn set_get_roundtrip_reuses_one_connection() {
    let url = spawn_server(|idx, args| {
        if idx == 0 {
            assert_eq!(args, vec![b"SET".to_vec(), b"key".to_vec(), b"value".to_vec()]);
            Some(&b"+OK\r\n"[..])
        } else {
            assert_eq!(args, vec![b"GET".to_vec(), b"key".to_vec()]);
            Some(&b"$5\r\nvalue\r\n"[..])
        }
    });

    let pool = pool_with_url(url, 1);
    {
        let mut lease = Lease::acquire(&pool).expect("lease");
        assert_eq!(commands::set(&mut lease, "key", "value").expect("set"), "OK");
    }
    {
        let mut lease = Lease::acquire(&pool).expect("lease");
        let value = commands::get(&mut lease, "key").expect("get");
        assert_eq!(value.as_deref(), Some("value"));
    }
    assert_eq!(pool.total_count(), 1);
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn hash_commands_are_framed_per_field() {
    let url = spawn_server(|idx, args| match idx {
        0 => {
            assert_eq!(args[0], b"HSET");
            assert_eq!(&args[1..], &[b"user:1".to_vec(), b"name".to_vec(), b"ann".to_vec()]);
            Some(&b":1\r\n"[..])
        }
        1 => {
            assert_eq!(args, vec![b"HDEL".to_vec(), b"user:1".to_vec(), b"name".to_vec()]);
            Some(&b":1\r\n"[..])
        }
        _ => {
            assert_eq!(args, vec![b"EXPIRE".to_vec(), b"user:1".to_vec(), b"30".to_vec()]);
            Some(&b":0\r\n"[..])
        }
    });

    let pool = pool_with_url(url, 1);
    let mut lease = Lease::acquire(&pool).expect("lease");
    assert_eq!(commands::hset(&mut lease, "user:1", "name", "ann").unwrap(), 1);
    assert_eq!(commands::hdel(&mut lease, "user:1", "name").unwrap(), 1);
    assert_eq!(commands::expire(&mut lease, "user:1", 30).unwrap(), 0);
}

#[test]
fn server_error_keeps_connection_pooled() {
    let url = spawn_server(|_, _| Some(&b"-WRONGTYPE wrong kind\r\n"[..]));

    let pool = pool_with_url(url, 1);
    {
        let mut lease = Lease::acquire(&pool).expect("lease");
        let err = commands::get(&mut lease, "hash").unwrap_err();
        assert!(matches!(err, ClientError::Redis(_)));
        assert_eq!(err.server_code(), Some("WRONGTYPE"));
        assert!(!err.poisons_connection());
    }
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn truncated_reply_discards_connection() {
    let url = spawn_server(|idx, _| if idx == 0 { None } else { Some(&b":-2\r\n"[..]) });

    let pool = pool_with_url(url, 1);
    {
        let mut lease = Lease::acquire(&pool).expect("lease");
        assert!(commands::get(&mut lease, "key").is_err());
    }
    assert_eq!(pool.total_count(), 0);

    // The slot is free again and a fresh socket answers normally.
    let mut lease = Lease::acquire(&pool).expect("lease");
    assert_eq!(commands::ttl(&mut lease, "key").unwrap(), -2);
}

#[test]
fn extreme_integer_replies_are_exact() {
    let url = spawn_server(|idx, _| {
        if idx == 0 {
            Some(&b":-9223372036854775808\r\n"[..])
        } else {
            Some(&b":9223372036854775807\r\n"[..])
        }
    });

    let pool = pool_with_url(url, 1);
    let mut lease = Lease::acquire(&pool).expect("lease");
    assert_eq!(commands::ttl(&mut lease, "low").unwrap(), i64::MIN);
    assert_eq!(commands::ttl(&mut lease, "high").unwrap(), i64::MAX);
}

#[test]
fn zero_timeouts_still_connect() {
    let url = spawn_server(|_, _| Some(&b"+PONG\r\n"[..]));

    let config = PoolConfig {
        read_timeout: Some(Duration::ZERO),
        write_timeout: Some(Duration::ZERO),
        connect_timeout: Some(Duration::ZERO),
        ..PoolConfig::with_url(url)
    };
    let pool = ConnectionPool::new(config).expect("pool");
    let mut lease = Lease::acquire(&pool).expect("lease");
    assert_eq!(commands::ping(&mut lease).unwrap(), "PONG");
}

#[test]
fn full_pool_fails_fast_without_timeout() {
    let url = spawn_server(|_, _| Some(&b"+PONG\r\n"[..]));

    let pool = pool_with_url(url, 1);
    let held = pool.acquire().expect("first");
    assert!(matches!(pool.acquire(), Err(ClientError::PoolExhausted)));
    pool.release(held);
    assert!(pool.acquire().is_ok());
}

#[test]
fn full_pool_waits_for_release() {
    let url = spawn_server(|_, _| Some(&b"+PONG\r\n"[..]));

    let mut config = PoolConfig::with_url(url);
    config.max_total = 1;
    config.acquire_timeout = Some(Duration::from_secs(2));
    let pool = ConnectionPool::new(config).expect("pool");

    let held = pool.acquire().expect("first");
    let releaser = {
        let pool = pool.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            pool.release(held);
        })
    };

    let mut lease = Lease::acquire(&pool).expect("waited lease");
    assert_eq!(commands::ping(&mut lease).unwrap(), "PONG");
    releaser.join().expect("join");
}

#[test]
fn unbounded_acquire_timeout_waits_instead_of_overflowing() {
    let url = spawn_server(|_, _| Some(&b"+PONG\r\n"[..]));

    let mut config = PoolConfig::with_url(url);
    config.max_total = 1;
    config.acquire_timeout = Some(Duration::MAX);
    let pool = ConnectionPool::new(config).expect("pool");

    let held = pool.acquire().expect("first");
    let releaser = {
        let pool = pool.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            pool.release(held);
        })
    };

    let mut lease = Lease::acquire(&pool).expect("waited lease");
    assert_eq!(commands::ping(&mut lease).unwrap(), "PONG");
    releaser.join().expect("join");
}
