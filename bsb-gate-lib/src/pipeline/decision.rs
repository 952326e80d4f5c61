use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use thiserror::Error;

/// Identity of a request that presented a valid bearer token.
///
/// Inserted into the request extensions by the pipeline so downstream handlers
/// can attribute the request. The token value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedToken(Arc<str>);

impl AuthenticatedToken {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthenticatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthenticatedToken").field(&"<redacted>").finish()
    }
}

/// Metadata attached to a rate limit rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDetails {
    pub limit: u32,
    pub window_seconds: u64,
    pub retry_after_seconds: u64,
}

/// Why an authentication attempt was refused
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Missing Authorization header")]
    MissingCredential,

    #[error("Invalid or expired token")]
    InvalidToken,
}

/// Terminal rejection produced by a gate
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Rate limit exceeded")]
    RateLimited(RateLimitDetails),

    #[error("{0}")]
    Unauthenticated(AuthFailure),

    #[error("Invalid Authorization header format. Expected: Bearer <token>")]
    MalformedCredential,
}

/// Rejection category, without metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    RateLimited,
    Unauthenticated,
    MalformedCredential,
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::RateLimited(_) => RejectionKind::RateLimited,
            Rejection::Unauthenticated(_) => RejectionKind::Unauthenticated,
            Rejection::MalformedCredential => RejectionKind::MalformedCredential,
        }
    }

    /// Short label for log fields
    pub fn error_type(&self) -> &'static str {
        match self {
            Rejection::RateLimited(_) => "rate_limited",
            Rejection::Unauthenticated(AuthFailure::MissingCredential) => "missing_credential",
            Rejection::Unauthenticated(AuthFailure::InvalidToken) => "invalid_token",
            Rejection::MalformedCredential => "malformed_credential",
        }
    }
}

impl From<&Rejection> for StatusCode {
    fn from(r: &Rejection) -> StatusCode {
        match r {
            Rejection::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Rejection::Unauthenticated(_) | Rejection::MalformedCredential => {
                StatusCode::UNAUTHORIZED
            }
        }
    }
}

/// Result of evaluating one gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Pass to the next stage
    Admit,
    /// Pass to the next stage, carrying the authenticated identity
    Identified(AuthenticatedToken),
    /// Stop here
    Reject(Rejection),
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        !matches!(self, Decision::Reject(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Decision::Reject(r) => Some(r),
            _ => None,
        }
    }
}
