//! API route handlers.

pub mod auth;
pub mod files;

use crate::auth::middleware::{check_rate_limit, resolve_identity, AppState};
use crate::error::AppError;
use crate::middleware::{panic_response, request_logging, security_headers};
use crate::storage::Store;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

/// Per-IP limit shared by the credential endpoints.
pub(crate) async fn enforce_auth_rate_limit<S: Store>(
    state: &AppState<S>,
    endpoint: &str,
    addr: &SocketAddr,
) -> Result<(), AppError> {
    let key = format!("ratelimit:{}:{}", endpoint, addr.ip());
    let allowed = check_rate_limit(
        &state.store,
        &key,
        state.config.rate_limit_auth_per_min,
        60,
    )
    .await
    .map_err(|e| AppError::Internal(format!("Rate limit check failed: {}", e)))?;

    if !allowed {
        let mut hasher = std::hash::DefaultHasher::new();
        addr.ip().hash(&mut hasher);
        let ip_hash = format!("{:x}", hasher.finish());
        tracing::warn!(action = "rate_limited", endpoint = %endpoint, ip_hash = %ip_hash, "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(())
}

/// Build the API router with all endpoints.
pub fn api_router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        // Auth endpoints
        .route("/api/register", post(auth::register::<S>))
        .route("/api/login", post(auth::login::<S>))
        .route("/api/logout", post(auth::logout::<S>))
        .route("/api/auth/logout-all", post(auth::logout_all::<S>))
        .route("/api/me", get(auth::me))
        // File endpoints
        .route(
            "/api/files",
            get(files::list_files::<S>).post(files::upload_file::<S>),
        )
        .route("/api/files/{filename}", get(files::download_file::<S>))
        .route("/api/share", post(files::share_file::<S>))
}

/// The full application: routes plus identity, logging, hardening and the panic boundary.
pub fn app<S: Store>(state: AppState<S>) -> Router {
    // Explicit CORS: no allowed origins, so cross-origin requests are refused.
    let cors = CorsLayer::new();

    api_router::<S>()
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_identity::<S>,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(middleware::from_fn(security_headers))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}
