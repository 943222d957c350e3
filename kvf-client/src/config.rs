//! # Pool Configuration
//!
//! Connection pool settings with defaults matching a local Redis, plus an
//! environment loader for binaries.

use std::env;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Environment variable names read by [`PoolConfig::from_env`].
pub const ENV_URL: &str = "KVF_URL";
pub const ENV_MAX_IDLE: &str = "KVF_MAX_IDLE";
pub const ENV_MAX_TOTAL: &str = "KVF_MAX_TOTAL";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "KVF_CONNECT_TIMEOUT_MS";
pub const ENV_IO_TIMEOUT_MS: &str = "KVF_IO_TIMEOUT_MS";
pub const ENV_ACQUIRE_TIMEOUT_MS: &str = "KVF_ACQUIRE_TIMEOUT_MS";

/// Pool configuration for the sync client.
///
/// A zero timeout means "no timeout", the same as `None`.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Redis URL, e.g. "redis://127.0.0.1:6379/".
    pub url: String,
    /// Maximum number of idle connections to keep.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Optional socket read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional socket write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional connect timeout.
    pub connect_timeout: Option<Duration>,
    /// How long `acquire` waits for a release when the pool is full.
    /// `None` fails fast with `PoolExhausted`.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            url: "redis://127.0.0.1:6379/".to_string(),
            max_idle: 8,
            max_total: 16,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
            acquire_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Creates the default configuration pointed at `url`.
    pub fn with_url(url: impl Into<String>) -> Self {
        PoolConfig {
            url: url.into(),
            ..PoolConfig::default()
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `KVF_URL`: Redis URL (default: `redis://127.0.0.1:6379/`)
    /// - `KVF_MAX_IDLE`: idle connections kept (default: 8)
    /// - `KVF_MAX_TOTAL`: total connection cap (default: 16)
    /// - `KVF_CONNECT_TIMEOUT_MS`: connect timeout, 0 for none (default: none)
    /// - `KVF_IO_TIMEOUT_MS`: read and write timeout, 0 for none (default: none)
    /// - `KVF_ACQUIRE_TIMEOUT_MS`: pool wait when full (default: fail fast)
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` when a variable is set but not a
    /// valid number, or when `max_total` is zero.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PoolConfig::default();
        let io_timeout = parse_millis(&lookup, ENV_IO_TIMEOUT_MS)?;

        let config = PoolConfig {
            url: lookup(ENV_URL).unwrap_or(defaults.url),
            max_idle: parse_usize(&lookup, ENV_MAX_IDLE)?.unwrap_or(defaults.max_idle),
            max_total: parse_usize(&lookup, ENV_MAX_TOTAL)?.unwrap_or(defaults.max_total),
            read_timeout: io_timeout,
            write_timeout: io_timeout,
            connect_timeout: parse_millis(&lookup, ENV_CONNECT_TIMEOUT_MS)?,
            acquire_timeout: parse_millis(&lookup, ENV_ACQUIRE_TIMEOUT_MS)?,
        };

        if config.max_total == 0 {
            return Err(ClientError::InvalidConfig(format!(
                "{} must be at least 1",
                ENV_MAX_TOTAL
            )));
        }
        Ok(config)
    }
}

/// Maps a zero duration to `None`; socket APIs reject zero timeouts.
pub(crate) fn non_zero(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|duration| !duration.is_zero())
}

fn parse_usize<F>(lookup: &F, name: &str) -> ClientResult<Option<usize>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ClientError::InvalidConfig(format!("{} is not a number: {:?}", name, raw))),
        None => Ok(None),
    }
}

fn parse_millis<F>(lookup: &F, name: &str) -> ClientResult<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let millis = parse_usize(lookup, name)?;
    Ok(non_zero(millis.map(|ms| Duration::from_millis(ms as u64))))
}
