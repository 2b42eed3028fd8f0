//! Error types and Axum response conversions.
//!
//! [`AuthError`] is what the credential, session and access-control components
//! return. [`AppError`] is the HTTP boundary: every handler error ends up as
//! one of its variants and is rendered as `{"error": "..."}`.

use crate::storage::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Coarse error classes shared by all core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    InvalidCredentials,
    Expired,
    Forbidden,
    Conflict,
    BadRequest,
    Internal,
}

/// Errors returned by the auth core.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Unknown user")]
    UnknownUser,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("Cannot share a file with its owner")]
    SelfShare,

    #[error("File not found")]
    ResourceNotFound,

    #[error("Unknown recipient")]
    UnknownGrantee,

    /// Resource absent or not visible to the caller. Deliberately one variant.
    #[error("File not found")]
    NotFound,

    #[error("Concurrent update conflict, retry")]
    Conflict,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::UsernameTaken => ErrorKind::AlreadyExists,
            AuthError::UnknownUser
            | AuthError::SessionNotFound
            | AuthError::ResourceNotFound
            | AuthError::UnknownGrantee
            | AuthError::NotFound => ErrorKind::NotFound,
            AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
            AuthError::SessionExpired => ErrorKind::Expired,
            AuthError::SelfShare => ErrorKind::Forbidden,
            AuthError::Conflict => ErrorKind::Conflict,
            AuthError::InvalidInput(_) => ErrorKind::BadRequest,
            AuthError::Hashing(_) | AuthError::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UsernameTaken => AppError::Conflict(err.to_string()),
            // Login never tells the caller which half of the pair was wrong
            AuthError::UnknownUser | AuthError::InvalidCredentials => {
                AppError::Unauthorized("Invalid username or password".to_string())
            }
            AuthError::SessionNotFound | AuthError::SessionExpired => {
                AppError::Unauthorized("Not authenticated".to_string())
            }
            AuthError::SelfShare => AppError::Forbidden(err.to_string()),
            AuthError::ResourceNotFound | AuthError::UnknownGrantee | AuthError::NotFound => {
                AppError::NotFound(err.to_string())
            }
            AuthError::Conflict => AppError::Conflict(err.to_string()),
            AuthError::InvalidInput(msg) => AppError::BadRequest(msg),
            AuthError::Hashing(msg) => AppError::Internal(msg),
            AuthError::Store(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}
