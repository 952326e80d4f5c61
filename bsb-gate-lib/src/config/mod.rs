mod loader;
mod types;
mod validator;

pub use loader::{
    ENV_API_TOKENS, ENV_MAX_CLIENTS, ENV_MAX_REQUESTS, ENV_MODE, ENV_TRUST_FORWARDED_FOR,
    ENV_WINDOW_SECONDS,
};
pub use types::{AuthConfig, GateConfig, Mode, RateLimitConfig};
