use std::net::SocketAddr;

use http::{HeaderMap, Request};

use crate::pipeline::decision::Decision;

/// The parts of a request a gate may look at
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub path: &'a str,
    pub peer: Option<SocketAddr>,
    pub headers: &'a HeaderMap,
}

impl<'a> GateRequest<'a> {
    pub fn new(path: &'a str, peer: Option<SocketAddr>, headers: &'a HeaderMap) -> Self {
        Self { path, peer, headers }
    }

    pub fn from_request<B>(req: &'a Request<B>, peer: Option<SocketAddr>) -> Self {
        Self { path: req.uri().path(), peer, headers: req.headers() }
    }
}

/// A pipeline stage that admits or rejects a request.
///
/// Evaluation is synchronous and in-memory; a gate never performs I/O.
pub trait Gate: Send + Sync {
    /// Name used in log fields
    fn name(&self) -> &'static str;

    fn evaluate(&self, req: &GateRequest<'_>) -> Decision;
}
