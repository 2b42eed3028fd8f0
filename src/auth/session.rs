//! Session tokens and the session manager.

use crate::error::AuthError;
use crate::models::StoredSession;
use crate::storage::Store;
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

/// Random bytes per session token.
pub const TOKEN_BYTES: usize = 32;

/// Length of an encoded token (URL-safe base64 of 32 bytes, no padding).
pub const TOKEN_LEN: usize = 43;

/// Issuance gives up after this many token collisions.
const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Generate a cryptographically random session token.
///
/// Returns a URL-safe, unpadded base64 string (43 characters) from 32 random
/// bytes, so it can travel in a cookie value unescaped.
pub fn generate_session_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Cheap shape check run before any store lookup.
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Client-facing descriptor of a freshly issued session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: u64,
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues, validates and revokes sessions.
///
/// Holds no session state of its own: every call goes to the store.
#[derive(Clone)]
pub struct SessionManager<S> {
    store: S,
    ttl_secs: u64,
}

impl<S: Store> SessionManager<S> {
    pub fn new(store: S, ttl_secs: u64) -> Self {
        SessionManager { store, ttl_secs }
    }

    /// Create a session for `username` expiring `ttl_secs` from now.
    pub async fn issue(&self, username: &str) -> Result<SessionToken, AuthError> {
        self.issue_at(username, crate::unix_now()).await
    }

    /// [`issue`](Self::issue) with an explicit clock.
    pub async fn issue_at(&self, username: &str, now: u64) -> Result<SessionToken, AuthError> {
        let expires_at = now.saturating_add(self.ttl_secs);

        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let session = StoredSession {
                id: nanoid::nanoid!(12),
                username: username.to_string(),
                token: generate_session_token(),
                created_at: now,
                expires_at,
            };

            if self.store.insert_session(&session).await? {
                return Ok(SessionToken {
                    token: session.token,
                    expires_at,
                });
            }

            tracing::warn!(action = "token_collision", username = %username, "Session token collision, redrawing");
        }

        Err(AuthError::Conflict)
    }

    /// Resolve a token to its owner's username.
    pub async fn validate(&self, token: &str) -> Result<String, AuthError> {
        self.validate_at(token, crate::unix_now()).await
    }

    /// [`validate`](Self::validate) with an explicit clock.
    ///
    /// Fails with `SessionNotFound` for unknown or malformed tokens and with
    /// `SessionExpired` once `now >= expires_at`.
    pub async fn validate_at(&self, token: &str, now: u64) -> Result<String, AuthError> {
        if !is_well_formed_token(token) {
            return Err(AuthError::SessionNotFound);
        }

        let session = self
            .store
            .get_session(token)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.is_expired_at(now) {
            return Err(AuthError::SessionExpired);
        }

        Ok(session.username)
    }

    /// Delete the session identified by both `username` and `token`.
    ///
    /// Idempotent. Returns whether a session was actually removed; either way
    /// the caller should clear the client's cookie.
    pub async fn revoke(&self, username: &str, token: &str) -> Result<bool, AuthError> {
        Ok(self.store.delete_session(username, token).await?)
    }

    /// Delete every session of `username`. Returns how many were removed.
    pub async fn revoke_all(&self, username: &str) -> Result<usize, AuthError> {
        Ok(self.store.delete_user_sessions(username).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn manager() -> SessionManager<MemoryStore> {
        SessionManager::new(MemoryStore::new(), 3600)
    }

    #[test]
    fn test_generate_session_token() {
        let token = generate_session_token();

        assert_eq!(token.len(), TOKEN_LEN);
        assert!(is_well_formed_token(&token));

        let decoded = general_purpose::URL_SAFE_NO_PAD.decode(&token).unwrap();
        assert_eq!(decoded.len(), TOKEN_BYTES);
    }

    #[test]
    fn test_tokens_are_unique() {
        let token1 = generate_session_token();
        let token2 = generate_session_token();
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(!is_well_formed_token(""));
        assert!(!is_well_formed_token("short"));
        assert!(!is_well_formed_token(&"a".repeat(44)));
        assert!(!is_well_formed_token(&format!("{}=", "a".repeat(42))));
        assert!(!is_well_formed_token(&format!("{};", "a".repeat(42))));
    }

    #[tokio::test]
    async fn test_issue_and_validate() {
        let sessions = manager();
        let issued = sessions.issue_at("alice", 1_000).await.unwrap();
        assert_eq!(issued.expires_at, 4_600);

        let username = sessions.validate_at(&issued.token, 1_000).await.unwrap();
        assert_eq!(username, "alice");
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_inclusive() {
        let sessions = manager();
        let issued = sessions.issue_at("alice", 1_000).await.unwrap();

        assert!(sessions
            .validate_at(&issued.token, issued.expires_at - 1)
            .await
            .is_ok());
        assert!(matches!(
            sessions.validate_at(&issued.token, issued.expires_at).await,
            Err(AuthError::SessionExpired)
        ));
        assert!(matches!(
            sessions
                .validate_at(&issued.token, issued.expires_at + 1)
                .await,
            Err(AuthError::SessionExpired)
        ));
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let sessions = manager();
        let result = sessions.validate(&generate_session_token()).await;
        assert!(matches!(result, Err(AuthError::SessionNotFound)));

        let result = sessions.validate("garbage").await;
        assert!(matches!(result, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_multiple_sessions_per_user() {
        let sessions = manager();
        let a = sessions.issue("alice").await.unwrap();
        let b = sessions.issue("alice").await.unwrap();
        assert_ne!(a.token, b.token);
        assert_eq!(sessions.validate(&a.token).await.unwrap(), "alice");
        assert_eq!(sessions.validate(&b.token).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_revoke_is_scoped_and_idempotent() {
        let sessions = manager();
        let issued = sessions.issue("alice").await.unwrap();

        // Another identity presenting the token cannot revoke it
        assert!(!sessions.revoke("bob", &issued.token).await.unwrap());
        assert!(sessions.validate(&issued.token).await.is_ok());

        assert!(sessions.revoke("alice", &issued.token).await.unwrap());
        assert!(matches!(
            sessions.validate(&issued.token).await,
            Err(AuthError::SessionNotFound)
        ));

        assert!(!sessions.revoke("alice", &issued.token).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_all() {
        let sessions = manager();
        let a = sessions.issue("alice").await.unwrap();
        let b = sessions.issue("alice").await.unwrap();
        let c = sessions.issue("carol").await.unwrap();

        assert_eq!(sessions.revoke_all("alice").await.unwrap(), 2);
        assert!(sessions.validate(&a.token).await.is_err());
        assert!(sessions.validate(&b.token).await.is_err());
        assert!(sessions.validate(&c.token).await.is_ok());
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = SessionToken {
            token: "supersecret".to_string(),
            expires_at: 1,
        };
        assert!(!format!("{:?}", token).contains("supersecret"));
    }
}
