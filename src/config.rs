use crate::error::ConfigError;
use crate::sse::DEFAULT_CAPACITY;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for `POLL_BROADCAST_CAPACITY`. `broadcast::channel` panics on
/// capacities above `usize::MAX / 2`.
pub const MAX_BROADCAST_CAPACITY: usize = 65_536;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub broadcast_capacity: usize,
    pub keep_alive: Duration,
    /// When set, only clients presenting this token may reset the poll.
    pub admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            broadcast_capacity: DEFAULT_CAPACITY,
            keep_alive: Duration::from_secs(30),
            admin_token: None,
        }
    }
}

impl Config {
    /// Reads `POLL_*` variables, loading `.env` first if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let bind_addr = parse_or(&lookup, "POLL_BIND_ADDR", defaults.bind_addr)?;
        let broadcast_capacity =
            parse_or(&lookup, "POLL_BROADCAST_CAPACITY", defaults.broadcast_capacity)?;
        if broadcast_capacity == 0 || broadcast_capacity > MAX_BROADCAST_CAPACITY {
            return Err(ConfigError::InvalidValue {
                name: "POLL_BROADCAST_CAPACITY",
                value: broadcast_capacity.to_string(),
            });
        }
        let keep_alive_secs = parse_or(
            &lookup,
            "POLL_KEEP_ALIVE_SECS",
            defaults.keep_alive.as_secs(),
        )?;
        if keep_alive_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "POLL_KEEP_ALIVE_SECS",
                value: "0".to_string(),
            });
        }
        let admin_token = lookup("POLL_ADMIN_TOKEN").filter(|t| !t.is_empty());

        Ok(Config {
            bind_addr,
            broadcast_capacity,
            keep_alive: Duration::from_secs(keep_alive_secs),
            admin_token,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
