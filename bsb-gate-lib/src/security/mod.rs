pub mod auth;
pub mod client_id;
pub mod rate_limit;

pub use auth::{extract_bearer_token, TokenAuthenticator, TokenSet, DEV_TOKEN};
pub use client_id::{identify, identify_request, ClientKey};
pub use rate_limit::{RateLimitPolicy, RateLimitResult, RateLimiter, SlidingWindowCounter};

/// Liveness endpoint, exempt from every gate
pub const HEALTH_PATH: &str = "/health";

/// Paths the rate limiter never counts
pub const RATE_LIMIT_BYPASS_PATHS: &[&str] = &[HEALTH_PATH];

/// Paths that do not require a credential
pub const PUBLIC_PATHS: &[&str] = &[HEALTH_PATH];
