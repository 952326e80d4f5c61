use std::borrow::Cow;

use http::header::{HeaderValue, ALLOW};
use http::{Method, Request, Response, StatusCode};
use tracing::error;

use crate::error::{GateError, Result};
use crate::lookup::{is_valid_format, Lookup};
use crate::response::{error_response, full_body, health_response, success_response, RespBody};
use crate::security::HEALTH_PATH;

pub const BSB_PREFIX: &str = "/bsb/";
pub const LOOKUP_PATH: &str = "/lookup";

const INVALID_FORMAT: &str = "Invalid BSB number format. Expected format: 123456 or 123-456";
const MISSING_PARAM: &str = "Missing required parameter: bsb";

enum Route<'a> {
    Health,
    /// Raw, still percent-encoded path segment
    Bsb(&'a str),
    Lookup,
}

impl<'a> Route<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        if path == HEALTH_PATH {
            return Some(Route::Health);
        }
        if path == LOOKUP_PATH {
            return Some(Route::Lookup);
        }
        // Exactly one non-empty segment after the prefix
        path.strip_prefix(BSB_PREFIX)
            .filter(|segment| !segment.is_empty() && !segment.contains('/'))
            .map(Route::Bsb)
    }
}

/// Route an admitted request. Handler faults become a generic 500.
///
/// `HEAD` is answered like `GET` with the body dropped.
pub fn dispatch<B>(lookup: &dyn Lookup, req: &Request<B>) -> Response<RespBody> {
    let resp = match route(lookup, req) {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, path = req.uri().path(), "Request handler failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    };
    if req.method() == Method::HEAD {
        resp.map(|_| full_body(""))
    } else {
        resp
    }
}

fn route<B>(lookup: &dyn Lookup, req: &Request<B>) -> Result<Response<RespBody>> {
    let Some(route) = Route::parse(req.uri().path()) else {
        return Ok(error_response(StatusCode::NOT_FOUND, "Endpoint not found"));
    };
    if req.method() != Method::GET && req.method() != Method::HEAD {
        let mut resp = error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
        resp.headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
        return Ok(resp);
    }

    match route {
        Route::Health => Ok(health_response()),
        Route::Bsb(segment) => find(lookup, decode(segment).as_deref()),
        Route::Lookup => match query_param(req.uri().query(), "bsb") {
            Some(number) => find(lookup, Some(&*number)),
            None => Ok(error_response(StatusCode::BAD_REQUEST, MISSING_PARAM)),
        },
    }
}

/// `None` means the raw value did not decode to UTF-8
fn find(lookup: &dyn Lookup, number: Option<&str>) -> Result<Response<RespBody>> {
    let Some(number) = number.filter(|n| is_valid_format(n)) else {
        return Ok(error_response(StatusCode::BAD_REQUEST, INVALID_FORMAT));
    };
    let Some(record) = lookup.lookup(number) else {
        return Ok(error_response(StatusCode::NOT_FOUND, "BSB number not found"));
    };
    let data = serde_json::to_value(&record)
        .map_err(|e| GateError::Http(format!("failed to encode record: {e}")))?;
    Ok(success_response(data))
}

fn decode(raw: &str) -> Option<Cow<'_, str>> {
    urlencoding::decode(raw).ok()
}

/// First non-empty, percent-decoded value of `name` in a query string
fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<Cow<'a, str>> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| *key == name)
        .filter_map(|(_, value)| decode(value))
        .find(|value| !value.is_empty())
}
