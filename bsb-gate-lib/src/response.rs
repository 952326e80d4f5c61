//! JSON response builders shared by the pipeline and the service handlers.

use chrono::{SecondsFormat, Utc};
use http::header::{
    HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA, RETRY_AFTER,
};
use http::StatusCode;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use serde_json::{json, Value};

use crate::pipeline::{RateLimitDetails, Rejection};

pub type RespBody = BoxBody<Bytes, hyper::Error>;

pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Current time as RFC 3339 UTC with second precision
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn full_body(bytes: impl Into<Bytes>) -> RespBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed()
}

/// JSON response with the no-cache headers set
pub fn json_response(status: StatusCode, body: &Value) -> Response<RespBody> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let mut resp = Response::new(full_body(bytes));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp.headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    resp.headers_mut()
        .insert(PRAGMA, HeaderValue::from_static("no-cache"));
    resp.headers_mut().insert(EXPIRES, HeaderValue::from_static("0"));
    resp
}

/// `{success:false, error, timestamp}` error response
pub fn error_response(status: StatusCode, message: &str) -> Response<RespBody> {
    json_response(
        status,
        &json!({
            "success": false,
            "error": message,
            "timestamp": timestamp(),
        }),
    )
}

/// `{success:true, data, timestamp}` response
pub fn success_response(data: Value) -> Response<RespBody> {
    json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "data": data,
            "timestamp": timestamp(),
        }),
    )
}

/// Health check response - always 200 while the process is running
pub fn health_response() -> Response<RespBody> {
    json_response(StatusCode::OK, &json!({"status": "ok", "timestamp": timestamp()}))
}

/// Render a gate rejection
pub fn rejection_response(rejection: &Rejection) -> Response<RespBody> {
    match rejection {
        Rejection::RateLimited(details) => rate_limited_response(details),
        other => error_response(StatusCode::from(other), &other.to_string()),
    }
}

fn rate_limited_response(details: &RateLimitDetails) -> Response<RespBody> {
    let rejection = Rejection::RateLimited(*details);
    let mut resp = json_response(
        StatusCode::TOO_MANY_REQUESTS,
        &json!({
            "success": false,
            "error": rejection.to_string(),
            "details": {
                "max_requests": details.limit,
                "window_seconds": details.window_seconds,
                "retry_after": details.retry_after_seconds,
            },
            "timestamp": timestamp(),
        }),
    );

    let headers = resp.headers_mut();
    headers.insert(RETRY_AFTER, HeaderValue::from(details.retry_after_seconds));
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(details.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-window"),
        HeaderValue::from(details.window_seconds),
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AuthFailure;

    async fn body_json(resp: Response<RespBody>) -> Value {
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map(|c| c.to_bytes())
            .unwrap_or_default();
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }

    #[tokio::test]
    async fn rate_limited_has_headers_and_details() {
        let resp = rejection_response(&Rejection::RateLimited(RateLimitDetails {
            limit: 100,
            window_seconds: 60,
            retry_after_seconds: 60,
        }));
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()["retry-after"], "60");
        assert_eq!(resp.headers()["x-ratelimit-limit"], "100");
        assert_eq!(resp.headers()["x-ratelimit-window"], "60");
        assert_eq!(resp.headers()["cache-control"], NO_CACHE);
        assert_eq!(resp.headers()["pragma"], "no-cache");
        assert_eq!(resp.headers()["expires"], "0");

        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Rate limit exceeded");
        assert_eq!(body["details"]["max_requests"], 100);
        assert_eq!(body["details"]["window_seconds"], 60);
        assert_eq!(body["details"]["retry_after"], 60);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn unauthenticated_bodies() {
        let cases = [
            (
                Rejection::Unauthenticated(AuthFailure::MissingCredential),
                "Missing Authorization header",
            ),
            (
                Rejection::MalformedCredential,
                "Invalid Authorization header format. Expected: Bearer <token>",
            ),
            (Rejection::Unauthenticated(AuthFailure::InvalidToken), "Invalid or expired token"),
        ];
        for (rejection, message) in cases {
            let resp = rejection_response(&rejection);
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(resp.headers()["content-type"], "application/json");
            let body = body_json(resp).await;
            assert_eq!(body["success"], false);
            assert_eq!(body["error"], message);
        }
    }

    #[test]
    fn timestamp_is_rfc3339_utc() {
        let ts = timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
