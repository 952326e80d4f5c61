//! Per-client rate limiting.
//!
//! # Architecture
//!
//! 1. **SlidingWindowCounter** (`window.rs`): exact sliding-window log per client,
//!    stored in a sharded lock table so unrelated clients do not contend.
//!
//! 2. **Clock** (`clock.rs`): whole-second time source, swappable in tests.
//!
//! 3. **RateLimiter** (`limiter.rs`): applies a fixed policy, skips bypass paths,
//!    identifies the client and produces a pipeline decision.
//!
//! # Example Usage
//!
//! ```ignore
//! use bsb_gate_lib::security::rate_limit::{RateLimitPolicy, RateLimitResult, RateLimiter};
//!
//! // 100 requests per rolling minute
//! let limiter = RateLimiter::new(RateLimitPolicy::new(100, 60)?);
//!
//! match limiter.check(&key) {
//!     RateLimitResult::Allowed { limit, remaining } => {
//!         println!("Request allowed. {}/{} remaining", remaining, limit);
//!     }
//!     RateLimitResult::Limited { retry_after, .. } => {
//!         println!("Rate limited. Try again in {:?}", retry_after);
//!     }
//! }
//! ```
//!
//! # Limitations
//!
//! State lives in process memory. Restarting clears it and several instances
//! behind a load balancer each enforce the limit independently.

mod clock;
mod limiter;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{RateLimitResult, RateLimiter};
pub use window::{Admission, RateLimitPolicy, SlidingWindowCounter};
