use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bsb_gate_lib::config::{AuthConfig, GateConfig, Mode, RateLimitConfig};
use bsb_gate_lib::{run, AppState, RequestPipeline, StaticLookup};
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const TABLE: &str = r#"{
    "062-000": ["CBA", "Sydney Branch", "1 Main St", "Sydney", "NSW", "2000", "PEH"]
}"#;

struct TestServer {
    base: String,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<bsb_gate_lib::Result<()>>,
}

impl TestServer {
    async fn stop(self) -> TestResult {
        let _ = self.shutdown.send(());
        self.handle.await??;
        Ok(())
    }
}

async fn start(max_requests: u32) -> Result<TestServer, Box<dyn std::error::Error + Send + Sync>> {
    let mut data = NamedTempFile::new()?;
    data.write_all(TABLE.as_bytes())?;
    let lookup = StaticLookup::from_path(data.path());

    let config = GateConfig {
        mode: Mode::Production,
        rate_limit: RateLimitConfig { max_requests, ..RateLimitConfig::default() },
        auth: AuthConfig { api_tokens: "abc123".to_string() },
    };
    let pipeline = RequestPipeline::from_config(&config)?;
    let state = Arc::new(
        AppState::new(pipeline, Arc::new(lookup)).with_shutdown_timeout(Duration::from_secs(1)),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(run(listener, state, async move {
        let _ = rx.await;
    }));

    Ok(TestServer { base, shutdown: tx, handle })
}

#[tokio::test]
async fn test_lookup_flow() -> TestResult {
    let server = start(100).await?;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/bsb/062-000", server.base))
        .bearer_auth("abc123")
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["cache-control"], "no-cache, no-store, must-revalidate");
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["bsb"], "062000");
    assert_eq!(body["data"]["flags"]["paper"], true);

    let resp = client
        .get(format!("{}/lookup?bsb=062000", server.base))
        .bearer_auth("abc123")
        .send()
        .await?;
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/bsb/062%2D000", server.base))
        .bearer_auth("abc123")
        .send()
        .await?;
    assert_eq!(resp.status(), 200);

    let resp = client.head(format!("{}/health", server.base)).send().await?;
    assert_eq!(resp.status(), 200);
    assert!(resp.bytes().await?.is_empty());

    let resp = client
        .get(format!("{}/bsb/062/000", server.base))
        .bearer_auth("abc123")
        .send()
        .await?;
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{}/bsb/999999", server.base))
        .bearer_auth("abc123")
        .send()
        .await?;
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{}/bsb/12345", server.base))
        .bearer_auth("abc123")
        .send()
        .await?;
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/bsb/062000", server.base))
        .bearer_auth("abc123")
        .send()
        .await?;
    assert_eq!(resp.status(), 405);

    drop(client);
    server.stop().await
}

#[tokio::test]
async fn test_auth_failures() -> TestResult {
    let server = start(100).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/bsb/062000", server.base);

    let resp = client.get(&url).send().await?;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "Missing Authorization header");

    let resp = client.get(&url).header("Authorization", "Token abc123").send().await?;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "Invalid Authorization header format. Expected: Bearer <token>");

    let resp = client.get(&url).bearer_auth("nope").send().await?;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "Invalid or expired token");

    drop(client);
    server.stop().await
}

#[tokio::test]
async fn test_rate_limit_and_health_bypass() -> TestResult {
    let server = start(3).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/bsb/062000", server.base);

    for _ in 0..3 {
        let resp = client.get(&url).bearer_auth("abc123").send().await?;
        assert_eq!(resp.status(), 200);
    }

    let resp = client.get(&url).bearer_auth("abc123").send().await?;
    assert_eq!(resp.status(), 429);
    assert_eq!(resp.headers()["retry-after"], "60");
    assert_eq!(resp.headers()["x-ratelimit-limit"], "3");
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Rate limit exceeded");
    assert_eq!(body["details"]["max_requests"], 3);

    // Over quota and unauthenticated: the rate limit answers first
    let resp = client.get(&url).send().await?;
    assert_eq!(resp.status(), 429);

    let resp = client.get(format!("{}/health", server.base)).send().await?;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["status"], "ok");

    drop(client);
    server.stop().await
}

#[tokio::test]
async fn test_missing_data_file_serves_not_found() -> TestResult {
    let lookup = StaticLookup::from_path("/nonexistent/bsb_db.json");
    let config = GateConfig {
        mode: Mode::Development,
        ..GateConfig::default()
    };
    let state = Arc::new(AppState::new(RequestPipeline::from_config(&config)?, Arc::new(lookup)));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(run(listener, state, async move {
        let _ = rx.await;
    }));

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base}/bsb/062000"))
        .bearer_auth("dev-token-123")
        .send()
        .await?;
    assert_eq!(resp.status(), 404);

    drop(client);
    let _ = tx.send(());
    handle.await??;
    Ok(())
}
