//! httpbin-style test server for exercising the network client over real
//! HTTP.
//!
//! Every route is stateless: responses depend only on the incoming request,
//! so a single server can be shared by concurrent tests.

use std::collections::BTreeMap;
use std::io;

use axum::{
    body::Body,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

/// Upper bound for `/bytes/{n}`.
pub const MAX_BYTES: usize = 16 * 1024 * 1024;

/// Payload of `/interrupted` before the connection is cut.
pub const PARTIAL_BODY: &[u8] = b"partial data";

/// What `/anything` reports back about the request it received.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/json", get(slideshow))
        .route("/camel", get(camel_case_profile))
        .route("/status/{code}", any(status))
        .route("/anything", any(anything))
        .route("/anything/{*rest}", any(anything))
        .route("/bytes/{n}", get(bytes))
        .route("/interrupted", get(interrupted))
        .route("/error", any(domain_error))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn slideshow() -> Json<serde_json::Value> {
    Json(json!({
        "slideshow": {
            "title": "Sample Slide Show",
            "author": "Yours Truly",
            "slides": [
                {"title": "Wake up to WonderWidgets!", "type": "all"},
                {"title": "Overview", "type": "all"}
            ]
        }
    }))
}

async fn camel_case_profile() -> Json<serde_json::Value> {
    Json(json!({"displayName": "Ada Lovelace", "accountId": 1815}))
}

/// Empty body with the requested status.
async fn status(Path(code): Path<u16>) -> Result<StatusCode, StatusCode> {
    match StatusCode::from_u16(code) {
        Ok(status) if status.as_u16() >= 200 => Ok(status),
        _ => Err(StatusCode::BAD_REQUEST),
    }
}

async fn anything(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    })
}

async fn bytes(Path(n): Path<usize>) -> Response {
    if n > MAX_BYTES {
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }
    let payload: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
    ([(header::CONTENT_TYPE, "application/octet-stream")], payload).into_response()
}

/// Sends part of a body, then fails the stream so the connection is cut.
async fn interrupted() -> Response {
    let chunks: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from_static(PARTIAL_BODY)),
        Err(io::Error::new(io::ErrorKind::ConnectionAborted, "transfer interrupted")),
    ];
    Body::from_stream(futures::stream::iter(chunks)).into_response()
}

async fn domain_error() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "message": "invalid location"})),
    )
}
