//! Request admission pipeline.
//!
//! Gates run in a fixed order and the first rejection wins:
//!
//! ```text
//! Start -> RateLimitCheck -> {Rejected(RateLimited) | AuthCheck}
//!       -> {Rejected(Unauthenticated | MalformedCredential) | Admitted} -> Dispatched
//! ```
//!
//! Rate limiting runs before authentication, so unauthenticated traffic is still
//! metered and quotas are keyed by transport identity, never by token.

mod decision;
mod gate;

pub use decision::{
    AuthFailure, AuthenticatedToken, Decision, RateLimitDetails, Rejection, RejectionKind,
};
pub use gate::{Gate, GateRequest};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::{Request, Response};
use tracing::debug;

use crate::config::GateConfig;
use crate::error::Result;
use crate::response::{rejection_response, RespBody};
use crate::security::rate_limit::{Clock, RateLimiter, SystemClock};
use crate::security::{TokenAuthenticator, TokenSet};

/// Ordered chain of gates in front of a downstream handler.
#[derive(Clone)]
pub struct RequestPipeline {
    gates: Vec<Arc<dyn Gate>>,
}

impl RequestPipeline {
    /// Pipeline evaluating `gates` in the given order
    pub fn new(gates: Vec<Arc<dyn Gate>>) -> Self {
        Self { gates }
    }

    /// Rate limiter first, then authenticator
    pub fn standard(rate_limiter: Arc<RateLimiter>, authenticator: Arc<TokenAuthenticator>) -> Self {
        Self::new(vec![rate_limiter as Arc<dyn Gate>, authenticator as Arc<dyn Gate>])
    }

    /// Standard pipeline built from configuration, using the system clock
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(config: &GateConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit, clock)?);
        let tokens = Arc::new(TokenSet::from_list(&config.auth.api_tokens, config.mode));
        let authenticator = Arc::new(TokenAuthenticator::new(tokens));
        Ok(Self::standard(rate_limiter, authenticator))
    }

    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Run every gate in order, stopping at the first rejection.
    ///
    /// On success returns the authenticated identity, if a gate established one.
    pub fn evaluate(
        &self,
        req: &GateRequest<'_>,
    ) -> std::result::Result<Option<AuthenticatedToken>, Rejection> {
        let mut identity = None;
        for gate in &self.gates {
            match gate.evaluate(req) {
                Decision::Admit => {}
                Decision::Identified(token) => identity = Some(token),
                Decision::Reject(rejection) => {
                    debug!(
                        gate = gate.name(),
                        path = req.path,
                        reason = rejection.error_type(),
                        "Request rejected"
                    );
                    return Err(rejection);
                }
            }
        }
        Ok(identity)
    }

    /// Admit the request and hand it to `downstream`, or render the rejection.
    ///
    /// The authenticated identity is available to `downstream` through
    /// `req.extensions().get::<AuthenticatedToken>()`.
    pub async fn handle<B, F, Fut>(
        &self,
        mut req: Request<B>,
        peer: Option<SocketAddr>,
        downstream: F,
    ) -> Response<RespBody>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Response<RespBody>>,
    {
        let outcome = self.evaluate(&GateRequest::from_request(&req, peer));
        match outcome {
            Ok(identity) => {
                if let Some(token) = identity {
                    req.extensions_mut().insert(token);
                }
                downstream(req).await
            }
            Err(rejection) => rejection_response(&rejection),
        }
    }
}
