//! Cross-cutting HTTP middleware.
//!
//! - [`security_headers`]: response hardening headers on every reply
//! - [`request_logging`]: one structured log line per request
//! - [`panic_response`]: body for `tower_http::catch_panic::CatchPanicLayer`

use crate::auth::middleware::caller_username;
use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;
use std::time::Instant;

/// Middleware that adds security headers to all responses.
///
/// - **Cache-Control: no-store**: responses carry per-user data
/// - **Referrer-Policy: no-referrer**
/// - **X-Content-Type-Options: nosniff**: download metadata must not be sniffed
/// - **X-Frame-Options: DENY**
///
/// # Usage
///
/// ```rust,no_run
/// use axum::Router;
/// use axum::middleware;
/// use sharebox::middleware::security_headers;
///
/// let app: Router = Router::new()
///     .layer(middleware::from_fn(security_headers));
/// ```
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));

    response
}

/// Log method, path, status, latency and caller for each request.
///
/// Must sit inside the identity layer to see the caller.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let username = caller_username(&request).unwrap_or("-").to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        action = "request",
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        username = %username,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );

    response
}

/// Turn a handler panic into a generic JSON 500. The panic message is logged only.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
