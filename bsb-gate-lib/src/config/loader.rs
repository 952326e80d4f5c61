use std::str::FromStr;

use crate::config::types::{AuthConfig, GateConfig, Mode, RateLimitConfig};
use crate::config::validator::validate;
use crate::error::{GateError, Result};

pub const ENV_API_TOKENS: &str = "BSB_API_TOKENS";
pub const ENV_MODE: &str = "BSB_ENV";
pub const ENV_MAX_REQUESTS: &str = "BSB_RATE_LIMIT_MAX_REQUESTS";
pub const ENV_WINDOW_SECONDS: &str = "BSB_RATE_LIMIT_WINDOW_SECONDS";
pub const ENV_MAX_CLIENTS: &str = "BSB_RATE_LIMIT_MAX_CLIENTS";
pub const ENV_TRUST_FORWARDED_FOR: &str = "BSB_TRUST_FORWARDED_FOR";

impl GateConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    ///
    /// Unset and blank variables fall back to their defaults.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let mode = match lookup(ENV_MODE) {
            Some(raw) => Mode::from_str(&raw)?,
            None => Mode::default(),
        };

        let defaults = RateLimitConfig::for_mode(mode);
        let rate_limit = RateLimitConfig {
            max_requests: parse_or(lookup(ENV_MAX_REQUESTS), ENV_MAX_REQUESTS, defaults.max_requests)?,
            window_seconds: parse_or(
                lookup(ENV_WINDOW_SECONDS),
                ENV_WINDOW_SECONDS,
                defaults.window_seconds,
            )?,
            max_clients: parse_or(lookup(ENV_MAX_CLIENTS), ENV_MAX_CLIENTS, defaults.max_clients)?,
            shards: defaults.shards,
            trust_forwarded_for: match lookup(ENV_TRUST_FORWARDED_FOR) {
                Some(raw) => parse_bool(&raw, ENV_TRUST_FORWARDED_FOR)?,
                None => defaults.trust_forwarded_for,
            },
        };

        let auth = AuthConfig { api_tokens: var(ENV_API_TOKENS).unwrap_or_default() };

        let cfg = GateConfig { mode, rate_limit, auth };
        validate(&cfg).map_err(GateError::Config)?;
        Ok(cfg)
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| GateError::Config(format!("Invalid value for {name} ('{value}'): {e}"))),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str, name: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(GateError::Config(format!("Invalid boolean for {name}: '{other}'"))),
    }
}
