#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod lookup;
pub mod pipeline;
pub mod response;
pub mod security;
pub mod server;
pub mod telemetry;

pub use config::{GateConfig, Mode, RateLimitConfig};
pub use error::{GateError, Result};
pub use lookup::{BsbRecord, Lookup, StaticLookup};
pub use pipeline::{Decision, Gate, GateRequest, Rejection, RequestPipeline};
pub use security::{ClientKey, RateLimiter, TokenAuthenticator, TokenSet};
pub use server::{run, serve, shutdown_signal, AppState};
