use std::sync::Arc;

use http::header::AUTHORIZATION;
use tracing::debug;

use crate::pipeline::{AuthFailure, AuthenticatedToken, Decision, Gate, GateRequest, Rejection};
use crate::security::auth::token_set::TokenSet;
use crate::security::PUBLIC_PATHS;

const BEARER: &str = "bearer";

/// Extract the token from a `Bearer <token>` credential.
///
/// The scheme is matched case-insensitively and must be followed by at least one
/// whitespace character and a non-empty token.
pub fn extract_bearer_token(credential: &str) -> Option<&str> {
    let scheme = credential.get(..BEARER.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER) {
        return None;
    }
    let rest = &credential[BEARER.len()..];
    if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Bearer token gate backed by a static [`TokenSet`].
pub struct TokenAuthenticator {
    tokens: Arc<TokenSet>,
    public_paths: &'static [&'static str],
}

impl TokenAuthenticator {
    pub fn new(tokens: Arc<TokenSet>) -> Self {
        Self { tokens, public_paths: PUBLIC_PATHS }
    }

    /// Replace the paths that skip authentication
    pub fn with_public_paths(mut self, paths: &'static [&'static str]) -> Self {
        self.public_paths = paths;
        self
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.contains(&path)
    }

    pub fn authenticate(&self, req: &GateRequest<'_>) -> Decision {
        if self.is_public(req.path) {
            return Decision::Admit;
        }

        let Some(header) = req.headers.get(AUTHORIZATION) else {
            return reject(Rejection::Unauthenticated(AuthFailure::MissingCredential), req.path);
        };

        // Non-ASCII credentials can never be a well-formed bearer token
        let Some(token) = header.to_str().ok().and_then(extract_bearer_token) else {
            return reject(Rejection::MalformedCredential, req.path);
        };

        if !self.tokens.contains(token) {
            return reject(Rejection::Unauthenticated(AuthFailure::InvalidToken), req.path);
        }

        Decision::Identified(AuthenticatedToken::new(token))
    }
}

fn reject(rejection: Rejection, path: &str) -> Decision {
    debug!(path, reason = rejection.error_type(), "Authentication failed");
    Decision::Reject(rejection)
}

impl Gate for TokenAuthenticator {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn evaluate(&self, req: &GateRequest<'_>) -> Decision {
        self.authenticate(req)
    }
}
