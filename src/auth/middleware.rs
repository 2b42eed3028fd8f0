//! Request identity resolution, extractors and rate limiting.
//!
//! [`resolve_identity`] runs once per request. It reads the session cookies,
//! binds the first one that validates and stores an [`Identity`] in the
//! request extensions. It never rejects a request: a missing, unknown or
//! expired session just leaves the caller anonymous. Handlers read the result through the [`Identity`] or
//! [`RequireUser`] extractors.

use crate::access::AccessControl;
use crate::auth::cookie;
use crate::auth::credentials::CredentialStore;
use crate::auth::session::SessionManager;
use crate::config::Config;
use crate::error::{AppError, ErrorKind};
use crate::storage::{Store, StoreError};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub config: Arc<Config>,
    pub credentials: CredentialStore<S>,
    pub sessions: SessionManager<S>,
    pub access: AccessControl<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, config: Config) -> Self {
        let sessions = SessionManager::new(store.clone(), config.session_ttl_secs);
        let credentials = CredentialStore::new(store.clone(), sessions.clone(), config.password);
        let access = AccessControl::new(store.clone(), config.storage_root.clone());
        AppState {
            store,
            config: Arc::new(config),
            credentials,
            sessions,
            access,
        }
    }
}

/// An authenticated caller and the token it presented.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub token: String,
}

impl std::fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Who is making the current request. Anonymous unless a valid session was presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    user: Option<AuthenticatedUser>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Identity::default()
    }

    pub fn authenticated(username: String, token: String) -> Self {
        Identity {
            user: Some(AuthenticatedUser { username, token }),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_ref()
    }
}

/// Username bound to a request by [`resolve_identity`], if any.
pub fn caller_username<B>(request: &axum::http::Request<B>) -> Option<&str> {
    request
        .extensions()
        .get::<Identity>()
        .and_then(Identity::username)
}

/// Middleware that binds an [`Identity`] to every request.
pub async fn resolve_identity<S: Store>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut identity = Identity::anonymous();
    for token in cookie::session_tokens_from_headers(request.headers()) {
        match state.sessions.validate(&token).await {
            Ok(username) => {
                identity = Identity::authenticated(username, token);
                break;
            }
            Err(e) if e.kind() == ErrorKind::Internal => {
                tracing::error!(error = %e, "Session lookup failed, continuing anonymously");
                break;
            }
            Err(_) => continue,
        }
    }

    request.extensions_mut().insert(identity);
    next.run(request).await
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor for handlers that need a signed-in caller.
///
/// Returns 401 Unauthorized when the request is anonymous.
pub struct RequireUser(pub AuthenticatedUser);

impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .and_then(|identity| identity.user.clone())
            .map(RequireUser)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))
    }
}

/// Fixed-window rate limit.
///
/// # Returns
/// * `Ok(true)` if under limit
/// * `Ok(false)` if limit exceeded
pub async fn check_rate_limit<S: Store>(
    store: &S,
    key: &str,
    max: u32,
    window_secs: u64,
) -> Result<bool, StoreError> {
    let count = store.hit_counter(key, window_secs).await?;
    Ok(count <= max)
}
