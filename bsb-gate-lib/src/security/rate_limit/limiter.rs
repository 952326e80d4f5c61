//! Rate limiting gate.
//!
//! Wraps the [`SlidingWindowCounter`] with a fixed policy, a clock and the
//! client identification rules, and turns the counter's answer into a
//! pipeline [`Decision`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::Result;
use crate::pipeline::{Decision, Gate, GateRequest, RateLimitDetails, Rejection};
use crate::security::client_id::{identify_request, ClientKey};
use crate::security::rate_limit::clock::{Clock, SystemClock};
use crate::security::rate_limit::window::{RateLimitPolicy, SlidingWindowCounter};
use crate::security::RATE_LIMIT_BYPASS_PATHS;

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed to proceed.
    Allowed {
        /// Maximum number of requests allowed in the window
        limit: u32,
        /// Number of requests remaining in the current window
        remaining: u32,
    },
    /// Request is rate limited and should be rejected.
    Limited {
        /// Maximum number of requests allowed in the window
        limit: u32,
        /// Window length
        window: Duration,
        /// How long the client should wait before retrying
        retry_after: Duration,
    },
}

impl RateLimitResult {
    /// Returns true if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Returns true if the request is limited.
    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitResult::Limited { .. })
    }

    /// Get the limit value.
    pub fn limit(&self) -> u32 {
        match self {
            RateLimitResult::Allowed { limit, .. } => *limit,
            RateLimitResult::Limited { limit, .. } => *limit,
        }
    }

    /// Get the remaining count (0 when limited).
    pub fn remaining(&self) -> u32 {
        match self {
            RateLimitResult::Allowed { remaining, .. } => *remaining,
            RateLimitResult::Limited { .. } => 0,
        }
    }

    /// Get the retry delay if limited.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Limited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Per-client sliding-window rate limiter.
///
/// # Example
/// ```ignore
/// use bsb_gate_lib::security::rate_limit::{RateLimitPolicy, RateLimiter};
///
/// let limiter = RateLimiter::new(RateLimitPolicy::new(100, 60)?);
/// let key = bsb_gate_lib::security::identify("203.0.113.7", "curl/8.0");
/// if limiter.check(&key).is_limited() {
///     // respond with 429
/// }
/// ```
pub struct RateLimiter {
    counter: SlidingWindowCounter,
    clock: Arc<dyn Clock>,
    bypass_paths: &'static [&'static str],
    trust_forwarded_for: bool,
}

impl RateLimiter {
    /// Limiter using the system clock and default table bounds.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_counter(SlidingWindowCounter::new(policy), Arc::new(SystemClock))
    }

    pub fn with_counter(counter: SlidingWindowCounter, clock: Arc<dyn Clock>) -> Self {
        Self {
            counter,
            clock,
            bypass_paths: RATE_LIMIT_BYPASS_PATHS,
            trust_forwarded_for: true,
        }
    }

    /// Build from configuration with the given clock
    pub fn from_config(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let policy = RateLimitPolicy::new(config.max_requests, config.window_seconds)?;
        let counter = SlidingWindowCounter::with_capacity(policy, config.max_clients, config.shards);
        Ok(Self::with_counter(counter, clock).trust_forwarded_for(config.trust_forwarded_for))
    }

    /// Replace the paths that are never rate limited
    pub fn with_bypass_paths(mut self, paths: &'static [&'static str]) -> Self {
        self.bypass_paths = paths;
        self
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.counter.policy()
    }

    pub fn counter(&self) -> &SlidingWindowCounter {
        &self.counter
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_paths.contains(&path)
    }

    /// Record a request for `key` and report whether it may proceed.
    pub fn check(&self, key: &ClientKey) -> RateLimitResult {
        let policy = self.counter.policy();
        let admission = self.counter.admit(key, self.clock.now_secs());
        let limit = policy.max_requests();

        if admission.admitted {
            let used = u32::try_from(admission.count).unwrap_or(u32::MAX);
            RateLimitResult::Allowed { limit, remaining: limit.saturating_sub(used) }
        } else {
            let window = Duration::from_secs(policy.window_seconds());
            RateLimitResult::Limited { limit, window, retry_after: window }
        }
    }

    /// Gate entry point: bypass check, identification, admission.
    pub fn admit(&self, req: &GateRequest<'_>) -> Decision {
        if self.is_bypassed(req.path) {
            return Decision::Admit;
        }

        let key = identify_request(req.peer, req.headers, self.trust_forwarded_for);
        match self.check(&key) {
            RateLimitResult::Allowed { limit, remaining } => {
                debug!(limit, remaining, "Rate limit check passed");
                Decision::Admit
            }
            RateLimitResult::Limited { limit, window, retry_after } => {
                debug!(client = %key.short(), path = req.path, limit, "Rate limit exceeded");
                Decision::Reject(Rejection::RateLimited(RateLimitDetails {
                    limit,
                    window_seconds: window.as_secs(),
                    retry_after_seconds: retry_after.as_secs(),
                }))
            }
        }
    }
}

impl Gate for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn evaluate(&self, req: &GateRequest<'_>) -> Decision {
        self.admit(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::client_id::identify;
    use crate::security::rate_limit::clock::ManualClock;
    use http::HeaderMap;

    fn limiter(max: u32, window: u64, clock: &ManualClock) -> RateLimiter {
        let policy = RateLimitPolicy::new(max, window).expect("valid policy");
        RateLimiter::with_counter(SlidingWindowCounter::new(policy), Arc::new(clock.clone()))
    }

    #[test]
    fn remaining_decreases_then_limits() {
        let clock = ManualClock::new(0);
        let limiter = limiter(3, 60, &clock);
        let key = identify("1.2.3.4", "ua");

        assert_eq!(limiter.check(&key), RateLimitResult::Allowed { limit: 3, remaining: 2 });
        assert_eq!(limiter.check(&key).remaining(), 1);
        assert_eq!(limiter.check(&key).remaining(), 0);

        let limited = limiter.check(&key);
        assert!(limited.is_limited());
        assert_eq!(limited.limit(), 3);
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn rejection_carries_policy_metadata() {
        let clock = ManualClock::new(0);
        let limiter = limiter(2, 60, &clock);
        let headers = HeaderMap::new();
        let peer = "10.1.1.1:4000".parse().ok();
        let req = GateRequest::new("/bsb/123456", peer, &headers);

        assert_eq!(limiter.admit(&req), Decision::Admit);
        clock.set(10);
        assert_eq!(limiter.admit(&req), Decision::Admit);
        clock.set(20);
        assert_eq!(
            limiter.admit(&req),
            Decision::Reject(Rejection::RateLimited(RateLimitDetails {
                limit: 2,
                window_seconds: 60,
                retry_after_seconds: 60,
            }))
        );
        clock.set(61);
        assert_eq!(limiter.admit(&req), Decision::Admit);
    }

    #[test]
    fn bypass_path_skips_counter() {
        let clock = ManualClock::new(0);
        let limiter = limiter(1, 60, &clock);
        let headers = HeaderMap::new();
        let health = GateRequest::new("/health", None, &headers);

        for _ in 0..50 {
            assert_eq!(limiter.admit(&health), Decision::Admit);
        }
        assert_eq!(limiter.counter().tracked_clients(), 0);
    }

    #[test]
    fn custom_bypass_paths() {
        static PATHS: &[&str] = &["/ping"];
        let clock = ManualClock::new(0);
        let limiter = limiter(1, 60, &clock).with_bypass_paths(PATHS);
        assert!(limiter.is_bypassed("/ping"));
        assert!(!limiter.is_bypassed("/health"));
    }
}
