use std::fmt;
use std::str::FromStr;

use crate::error::GateError;

/// Deployment mode
///
/// Only `Development` injects the well-known development token into the token set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Local development (default when `BSB_ENV` is unset)
    #[default]
    Development,
    /// Automated test runs, with a more lenient default request limit
    Test,
    /// Production deployment
    Production,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Test => "test",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "test" => Ok(Mode::Test),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(GateError::Config(format!("Unknown mode '{other}'"))),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests admitted per client inside one window
    /// Default: 100 (1000 in test mode)
    pub max_requests: u32,
    /// Sliding window length in seconds
    /// Default: 60
    pub window_seconds: u64,
    /// Number of distinct clients tracked before stale or least recently seen
    /// clients are evicted
    /// Default: 100000
    pub max_clients: usize,
    /// Number of lock shards in the window table (rounded up to a power of two)
    /// Default: 16
    pub shards: usize,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP` when present
    /// Default: true
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
            max_clients: default_max_clients(),
            shards: default_shards(),
            trust_forwarded_for: true,
        }
    }
}

impl RateLimitConfig {
    /// Defaults for the given mode
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Test => Self { max_requests: default_test_max_requests(), ..Self::default() },
            Mode::Development | Mode::Production => Self::default(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthConfig {
    /// Comma-separated list of accepted bearer tokens
    pub api_tokens: String,
}

/// Top-level gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GateConfig {
    pub mode: Mode,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}

fn default_max_requests() -> u32 {
    100
}

fn default_test_max_requests() -> u32 {
    1000
}

fn default_window_seconds() -> u64 {
    60
}

fn default_max_clients() -> usize {
    100_000
}

fn default_shards() -> usize {
    16
}
