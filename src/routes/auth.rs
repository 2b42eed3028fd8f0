//! Auth API endpoints.

use super::enforce_auth_rate_limit;
use crate::auth::cookie::{clear_session_cookie, session_cookie, session_tokens_from_headers};
use crate::auth::middleware::{AppState, Identity, RequireUser};
use crate::auth::session::SessionToken;
use crate::error::AppError;
use crate::models::{AuthResponse, CredentialsRequest, WhoAmIResponse};
use crate::storage::Store;
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;

fn signed_in<S: Store>(
    state: &AppState<S>,
    username: String,
    session: SessionToken,
) -> impl IntoResponse {
    let cookie = session_cookie(&session, state.config.cookie_secure, crate::unix_now());
    (
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            username,
            expires_at: session.expires_at,
        }),
    )
}

/// POST /api/register: Create an account and sign in
pub async fn register<S: Store>(
    State(state): State<AppState<S>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    enforce_auth_rate_limit(&state, "register", &addr).await?;

    let session = state
        .credentials
        .register(&req.username, &req.password)
        .await?;

    Ok(signed_in(&state, req.username, session))
}

/// POST /api/login: Check credentials and create a session
pub async fn login<S: Store>(
    State(state): State<AppState<S>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    enforce_auth_rate_limit(&state, "login", &addr).await?;

    let session = state
        .credentials
        .authenticate(&req.username, &req.password)
        .await?;

    Ok(signed_in(&state, req.username, session))
}

/// POST /api/logout: Invalidate current session
///
/// A caller holding only an expired or revoked cookie still gets the
/// clearing `Set-Cookie`. Without any session cookie the call is 401.
pub async fn logout<S: Store>(
    identity: Identity,
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    match identity.user() {
        Some(user) => {
            state.sessions.revoke(&user.username, &user.token).await?;
            tracing::info!(action = "logout", username = %user.username, "User logged out");
        }
        None if !session_tokens_from_headers(&headers).is_empty() => {
            tracing::debug!(action = "logout", "Clearing stale session cookie");
        }
        None => return Err(AppError::Unauthorized("Not authenticated".to_string())),
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(state.config.cookie_secure))],
    ))
}

/// POST /api/auth/logout-all: Invalidate every session of the caller
pub async fn logout_all<S: Store>(
    RequireUser(user): RequireUser,
    State(state): State<AppState<S>>,
) -> Result<impl IntoResponse, AppError> {
    let revoked = state.sessions.revoke_all(&user.username).await?;

    tracing::info!(action = "logout_all", username = %user.username, revoked, "All sessions revoked");

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(state.config.cookie_secure))],
    ))
}

/// GET /api/me: Current caller
pub async fn me(RequireUser(user): RequireUser) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        username: user.username,
    })
}
