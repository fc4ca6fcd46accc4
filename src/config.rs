//! Settings loaded from the environment (and `.env` when present).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::{AppError, Result};
use crate::pricing::surge::DEFAULT_SURGE_PRIORITY;

const PREFIX: &str = "SPACERATE_";

/// Runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Used when no entity in the chain declares a timezone
    pub default_timezone: Tz,
    /// Used when the customer declares no currency
    pub default_currency: String,
    /// Priority of the synthetic surge candidate
    pub surge_priority: i32,
    pub chain_cache_ttl: Duration,
    pub pressure_cache_ttl: Duration,
    /// Fallback `EnvFilter` directive when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_timezone: Tz::UTC,
            default_currency: "USD".to_string(),
            surge_priority: DEFAULT_SURGE_PRIORITY,
            chain_cache_ttl: Duration::from_secs(5 * 60),
            pressure_cache_ttl: Duration::from_secs(60 * 60),
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load `.env`, then read `SPACERATE_*` variables over the defaults
    pub fn from_env() -> Result<Self> {
        // a missing .env is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(&format!("{PREFIX}{name}")).filter(|v| !v.trim().is_empty());

        let default_timezone = match get("DEFAULT_TIMEZONE") {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|_| AppError::Config(format!("unknown timezone '{}'", name)))?,
            None => defaults.default_timezone,
        };
        let default_currency = get("DEFAULT_CURRENCY")
            .map(|c| c.trim().to_uppercase())
            .unwrap_or(defaults.default_currency);
        let surge_priority = parse_or(get("SURGE_PRIORITY"), "SURGE_PRIORITY", defaults.surge_priority)?;
        let chain_ttl = parse_or(get("CHAIN_CACHE_TTL_SECS"), "CHAIN_CACHE_TTL_SECS", 5 * 60u64)?;
        let pressure_ttl = parse_or(get("PRESSURE_CACHE_TTL_SECS"), "PRESSURE_CACHE_TTL_SECS", 60 * 60u64)?;
        let log_filter = get("LOG").unwrap_or(defaults.log_filter);

        Ok(Self {
            default_timezone,
            default_currency,
            surge_priority,
            chain_cache_ttl: Duration::from_secs(chain_ttl),
            pressure_cache_ttl: Duration::from_secs(pressure_ttl),
            log_filter,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, name: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("invalid {PREFIX}{name} '{}'", raw))),
        None => Ok(default),
    }
}
