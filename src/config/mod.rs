//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

use crate::util::time::DEFAULT_TICK_RATE;

/// Where room documents and events live
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store (single machine, tests, offline play)
    Memory,
    /// PostgREST-compatible HTTP store
    Rest { url: String, api_key: String },
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host tick rate in Hz
    pub tick_rate: u32,
    /// Room store backend
    pub store: StoreBackend,
    /// City used when location resolution fails
    pub default_city: String,
    /// Room capacity for rooms created by this host
    pub max_players: usize,
    /// How long the headless skirmish runs (seconds)
    pub skirmish_secs: u64,
    /// Fixed RNG seed (join codes, power-up picks); random when absent
    pub rng_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let store = match env::var("STORE_URL") {
            Ok(url) if !url.trim().is_empty() => StoreBackend::Rest {
                url: url.trim_end_matches('/').to_string(),
                api_key: env::var("STORE_API_KEY")
                    .map_err(|_| ConfigError::Missing("STORE_API_KEY"))?,
            },
            _ => StoreBackend::Memory,
        };

        let defaults = Self::default();

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            tick_rate: parse_var("TICK_RATE")?.unwrap_or(defaults.tick_rate),
            store,
            default_city: env::var("DEFAULT_CITY").unwrap_or(defaults.default_city),
            max_players: parse_var("MAX_PLAYERS")?.unwrap_or(defaults.max_players),
            skirmish_secs: parse_var("SKIRMISH_SECS")?.unwrap_or(defaults.skirmish_secs),
            rng_seed: parse_var("RNG_SEED")?,
        })
        .and_then(Self::validated)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if self.max_players < 2 {
            return Err(ConfigError::Invalid("MAX_PLAYERS"));
        }
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            tick_rate: DEFAULT_TICK_RATE,
            store: StoreBackend::Memory,
            default_city: "New York".to_string(),
            max_players: 8,
            skirmish_secs: 30,
            rng_seed: None,
        }
    }
}

/// Read and parse an optional variable
fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
