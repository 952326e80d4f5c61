//! HTTP front end: accept loop, admission pipeline and routing.

pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::lookup::Lookup;
use crate::pipeline::RequestPipeline;
use crate::response::RespBody;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a connection task needs, shared across connections.
pub struct AppState {
    pipeline: RequestPipeline,
    lookup: Arc<dyn Lookup>,
    shutdown_timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: RequestPipeline, lookup: Arc<dyn Lookup>) -> Self {
        Self { pipeline, lookup, shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT }
    }

    /// How long shutdown waits for open connections
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Admission pipeline, then routing
    pub async fn handle<B>(&self, req: Request<B>, peer: Option<SocketAddr>) -> Response<RespBody> {
        let lookup = self.lookup.as_ref();
        self.pipeline
            .handle(req, peer, |req: Request<B>| async move {
                routes::dispatch(lookup, &req)
            })
            .await
    }
}

/// Guard to decrement active connections counter when dropped
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Bind `addr` and serve until SIGINT or SIGTERM
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    run(listener, state, shutdown_signal()).await
}

/// Serve connections from `listener` until `shutdown` resolves, then wait for
/// active connections up to the configured timeout.
pub async fn run<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    let builder = ConnBuilder::new(TokioExecutor::new());
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    info!(%addr, gates = ?state.pipeline.gate_names(), "Starting lookup service (h1/h2)");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                active_connections.fetch_add(1, Ordering::Relaxed);
                let guard = ConnectionGuard(Arc::clone(&active_connections));
                let builder = builder.clone();
                let state = Arc::clone(&state);

                tokio::spawn(async move {
                    let _guard = guard;
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, hyper::Error>(state.handle(req, Some(peer)).await) }
                    });

                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        debug!(%peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }

    drain(&active_connections, state.shutdown_timeout).await;
    info!("Lookup service stopped");
    Ok(())
}

async fn drain(active_connections: &AtomicUsize, timeout: Duration) {
    info!("Waiting for active connections to finish (timeout: {}s)", timeout.as_secs());
    let start = Instant::now();

    loop {
        let active = active_connections.load(Ordering::Relaxed);
        if active == 0 {
            info!("All connections closed, shutdown complete");
            return;
        }
        if start.elapsed() >= timeout {
            warn!(active_connections = active, "Shutdown timeout reached with connections still open");
            return;
        }
        debug!(active_connections = active, "Waiting for connections to close");
        sleep(Duration::from_millis(100)).await;
    }
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to setup SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
