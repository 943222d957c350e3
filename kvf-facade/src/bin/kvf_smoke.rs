//! # Facade Smoke Check
//!
//! Purpose: Exercise every facade operation once against a live server so a
//! deployment's pool settings can be verified end to end.
//!
//! Usage: `kvf-smoke [key-prefix]`. Pool settings come from `KVF_*`
//! environment variables (see `PoolConfig::from_env`); log verbosity from
//! `RUST_LOG`.

use anyhow::{ensure, Context, Result};
use kvf_client::{commands, ConnectionPool, Lease, PoolConfig};
use kvf_facade::KvFacade;
use serde::{Deserialize, Serialize};
use tracing::info;

const DEFAULT_PREFIX: &str = "kvf-smoke";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Label {
    id: u32,
    name: String,
    tags: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kvf_client=debug".into()),
        )
        .init();

    let prefix = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_PREFIX.to_string());
    let config = PoolConfig::from_env().context("reading pool config")?;
    info!(url = %config.url, max_total = config.max_total, "connecting");

    let pool = ConnectionPool::new(config).context("creating pool")?;
    {
        let mut lease = Lease::acquire(&pool).context("connecting to server")?;
        let pong = commands::ping(&mut lease)?;
        info!(reply = %pong, "ping");
    }

    let kv = KvFacade::new(&pool);
    let result = run_checks(&kv, &prefix);

    // Clean up even when a check failed.
    for suffix in ["string", "object", "hash"] {
        let key = format!("{}:{}", prefix, suffix);
        if let Err(err) = kv.remove_key_entirely(&key) {
            tracing::warn!(%key, error = %err, "cleanup failed");
        }
    }

    result?;
    info!("all checks passed");
    Ok(())
}

fn run_checks(kv: &KvFacade<&ConnectionPool>, prefix: &str) -> Result<()> {
    let string_key = format!("{}:string", prefix);
    let status = kv.set_string(&string_key, "hello")?;
    ensure!(status == "OK", "SET replied {:?}", status);
    let read = kv.get_string(&string_key)?;
    ensure!(read.as_deref() == Some("hello"), "GET returned {:?}", read);
    info!(key = %string_key, "string round trip");

    let object_key = format!("{}:object", prefix);
    let label = Label {
        id: 7,
        name: "rust".into(),
        tags: vec!["systems".into(), "cli".into()],
    };
    kv.set_object(&object_key, &label)?;
    let decoded: Label = kv.get_object(&object_key)?;
    ensure!(decoded == label, "object decoded as {:?}", decoded);
    let untyped = kv.get_json(&object_key)?;
    ensure!(untyped["name"] == "rust", "untyped decode lost fields: {}", untyped);
    info!(key = %object_key, "object round trip");

    let hash_key = format!("{}:hash", prefix);
    kv.hash_set_string(&hash_key, "plain", "v1")?;
    kv.hash_set_object(&hash_key, "label", &label)?;
    let field: Label = kv.hash_get_object(&hash_key, "label")?;
    ensure!(field == label, "hash field decoded as {:?}", field);
    ensure!(kv.hash_delete_field(&hash_key, "plain")?, "HDEL removed nothing");
    ensure!(kv.hash_get_string(&hash_key, "plain")?.is_none(), "field survived HDEL");
    info!(key = %hash_key, "hash round trip");

    let applied = kv.expire(&hash_key, 60)?;
    ensure!(applied == 1, "EXPIRE replied {}", applied);
    let ttl = kv.ttl(&hash_key)?;
    ensure!((1..=60).contains(&ttl), "TTL replied {}", ttl);
    info!(key = %hash_key, ttl, "ttl applied");

    ensure!(kv.hash_delete_all(&hash_key)?, "hash key was not removed");
    ensure!(kv.ttl(&hash_key)? == -2, "removed key still has a TTL");
    ensure!(kv.delete(&string_key)?, "string key was not removed");
    Ok(())
}
