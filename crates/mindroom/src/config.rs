//! Server configuration.
//!
//! Defaults suit a local development server. Each setting can be
//! overridden through the environment:
//!
//! - `MINDROOM_BIND_ADDR`           (default: "127.0.0.1:8080")
//! - `MINDROOM_IDLE_TIMEOUT_SECS`   (default: "120", "0" disables)
//! - `MINDROOM_ROOM_CHANNEL_SIZE`   (default: "64")
//! - `MINDROOM_EMPTY_ROOM_TTL_SECS` (default: "300")
//! - `MINDROOM_MAX_PLAYERS`         (default: "10")

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use mindroom_room::{DEFAULT_CHANNEL_SIZE, RoomLimits};

pub const ENV_BIND_ADDR: &str = "MINDROOM_BIND_ADDR";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "MINDROOM_IDLE_TIMEOUT_SECS";
pub const ENV_ROOM_CHANNEL_SIZE: &str = "MINDROOM_ROOM_CHANNEL_SIZE";
pub const ENV_EMPTY_ROOM_TTL_SECS: &str = "MINDROOM_EMPTY_ROOM_TTL_SECS";
pub const ENV_MAX_PLAYERS: &str = "MINDROOM_MAX_PLAYERS";

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the server needs to know before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Connections that send nothing for this long are closed. `None`
    /// keeps idle connections open forever.
    pub idle_timeout: Option<Duration>,

    /// Command queue size of each room actor.
    pub room_channel_size: usize,

    /// How long a room may sit with nobody seated before it is reaped.
    pub empty_room_ttl: Duration,

    /// How often the reaper looks for empty rooms.
    pub reap_interval: Duration,

    pub limits: RoomLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout: Some(Duration::from_secs(120)),
            room_channel_size: DEFAULT_CHANNEL_SIZE,
            empty_room_ttl: Duration::from_secs(300),
            reap_interval: Duration::from_secs(30),
            limits: RoomLimits::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `MINDROOM_*` variables, falling back to defaults for any
    /// that are unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), but reads values through
    /// `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = lookup(ENV_BIND_ADDR).unwrap_or(defaults.bind_addr);
        let idle_secs = read_or_default(&lookup, ENV_IDLE_TIMEOUT_SECS, 120u64)?;
        let room_channel_size =
            read_or_default(&lookup, ENV_ROOM_CHANNEL_SIZE, defaults.room_channel_size)?;
        let ttl_secs = read_or_default(&lookup, ENV_EMPTY_ROOM_TTL_SECS, 300u64)?;
        let max_players =
            read_or_default(&lookup, ENV_MAX_PLAYERS, defaults.limits.max_players)?;

        if room_channel_size == 0 {
            return Err(invalid(ENV_ROOM_CHANNEL_SIZE, "0", "must be at least 1"));
        }
        // A game needs two seats to start.
        if max_players < 2 {
            return Err(invalid(
                ENV_MAX_PLAYERS,
                &max_players.to_string(),
                "must be at least 2",
            ));
        }

        Ok(Self {
            bind_addr,
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            room_channel_size,
            empty_room_ttl: Duration::from_secs(ttl_secs),
            reap_interval: defaults.reap_interval,
            limits: RoomLimits {
                max_players,
                ..defaults.limits
            },
        })
    }
}

fn read_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(key, &value, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
