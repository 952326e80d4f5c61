//! Client identification for rate limiting.
//!
//! A client is keyed by a SHA-256 digest of its source address and user agent.
//! Both fields are length-prefixed before hashing so that no choice of header
//! content can make two different (address, agent) pairs produce the same input.

use std::fmt;
use std::net::SocketAddr;

use http::HeaderMap;
use sha2::{Digest, Sha256};

/// Sentinel used when a component of the identity is missing.
pub const UNKNOWN: &str = "unknown";

/// Opaque, fixed-size key identifying one client for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey([u8; 32]);

impl ClientKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex prefix for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Derive the client key from a source address and a user agent.
///
/// Empty inputs are replaced by [`UNKNOWN`], so this always produces a key.
pub fn identify(source_address: &str, user_agent: &str) -> ClientKey {
    let source = non_empty_or_unknown(source_address);
    let agent = non_empty_or_unknown(user_agent);

    let mut hasher = Sha256::new();
    for field in [source, agent] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    ClientKey(hasher.finalize().into())
}

/// Derive the client key for an HTTP request.
///
/// Source address precedence: first `X-Forwarded-For` entry, then `X-Real-IP`
/// (both only when `trust_forwarded` is set), then the peer IP, then [`UNKNOWN`].
/// Unreadable header values fall through to the next candidate.
pub fn identify_request(
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    trust_forwarded: bool,
) -> ClientKey {
    let source = source_address(peer, headers, trust_forwarded);
    let agent = header_str(headers, http::header::USER_AGENT.as_str()).unwrap_or(UNKNOWN);
    identify(&source, agent)
}

/// Resolve the source address used for identification
pub fn source_address(
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    trust_forwarded: bool,
) -> String {
    if trust_forwarded {
        if let Some(first) = header_str(headers, "x-forwarded-for")
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return first.to_string();
        }
        if let Some(real_ip) = header_str(headers, "x-real-ip") {
            return real_ip.to_string();
        }
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn non_empty_or_unknown(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN
    } else {
        trimmed
    }
}
