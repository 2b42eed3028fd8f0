//! Registration and password authentication.

use crate::auth::password::{self, PasswordParams};
use crate::auth::session::{SessionManager, SessionToken};
use crate::error::AuthError;
use crate::models::StoredUser;
use crate::storage::Store;
use crate::validate;
use zeroize::Zeroizing;

/// Owns user records and turns valid credentials into sessions.
#[derive(Clone)]
pub struct CredentialStore<S> {
    store: S,
    sessions: SessionManager<S>,
    params: PasswordParams,
}

impl<S: Store> CredentialStore<S> {
    pub fn new(store: S, sessions: SessionManager<S>, params: PasswordParams) -> Self {
        CredentialStore {
            store,
            sessions,
            params,
        }
    }

    /// Create a user and immediately issue a session for it.
    ///
    /// The uniqueness check and the insert are one store operation, so of any
    /// number of concurrent registrations for a name exactly one succeeds.
    pub async fn register(&self, username: &str, password: &str) -> Result<SessionToken, AuthError> {
        validate::validate_username(username).map_err(AuthError::InvalidInput)?;
        validate::validate_password(password).map_err(AuthError::InvalidInput)?;

        // Cheap pre-check; the insert below is authoritative
        if self.store.get_user(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let hashed =
            password::hash_new_blocking(Zeroizing::new(password.to_string()), self.params).await?;

        let user = StoredUser {
            username: username.to_string(),
            password_hash: hashed.hash,
            salt: hashed.salt,
            params: hashed.params,
            created_at: crate::unix_now(),
        };

        if !self.store.insert_user(&user).await? {
            return Err(AuthError::UsernameTaken);
        }

        tracing::info!(action = "user_registered", username = %username, "User registered");

        self.sessions.issue(username).await
    }

    /// Check a username/password pair and issue a session on success.
    ///
    /// Unknown users still pay for one hash derivation so timing does not
    /// reveal whether the name exists.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, AuthError> {
        let user = if validate::validate_username(username).is_ok() {
            self.store.get_user(username).await?
        } else {
            None
        };

        let stored = user.map(|u| (u.password_hash, u.salt, u.params));
        let known = stored.is_some();

        let valid =
            password::verify_blocking(Zeroizing::new(password.to_string()), stored, self.params)
                .await?;

        if !known {
            tracing::warn!(action = "auth_failed", reason = "unknown_user", "Authentication failed");
            return Err(AuthError::UnknownUser);
        }
        if !valid {
            tracing::warn!(action = "auth_failed", username = %username, reason = "bad_password", "Authentication failed");
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.sessions.issue(username).await?;
        tracing::info!(action = "auth_success", username = %username, "User authenticated");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn fast() -> PasswordParams {
        PasswordParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn setup() -> (CredentialStore<MemoryStore>, SessionManager<MemoryStore>) {
        let store = MemoryStore::new();
        let sessions = SessionManager::new(store.clone(), 3600);
        (
            CredentialStore::new(store, sessions.clone(), fast()),
            sessions,
        )
    }

    #[tokio::test]
    async fn test_register_issues_valid_session() {
        let (credentials, sessions) = setup();
        let issued = credentials.register("alice", "pw1").await.unwrap();
        assert_eq!(sessions.validate(&issued.token).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let (credentials, _) = setup();
        credentials.register("alice", "pw1").await.unwrap();
        let result = credentials.register("alice", "other").await;
        assert!(matches!(result, Err(AuthError::UsernameTaken)));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (credentials, _) = setup();
        assert!(matches!(
            credentials.register("a", "pw").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            credentials.register("bad name", "pw").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            credentials.register("alice", "").await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_register_succeeds_once() {
        let (credentials, _) = setup();

        let mut handles = Vec::new();
        for i in 0..8 {
            let credentials = credentials.clone();
            handles.push(tokio::spawn(async move {
                credentials.register("alice", &format!("pw{}", i)).await
            }));
        }

        let mut ok = 0;
        let mut taken = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(AuthError::UsernameTaken) => taken += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(taken, 7);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let (credentials, sessions) = setup();
        credentials.register("alice", "pw1").await.unwrap();

        let issued = credentials.authenticate("alice", "pw1").await.unwrap();
        assert_eq!(sessions.validate(&issued.token).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let (credentials, _) = setup();
        credentials.register("alice", "pw1").await.unwrap();

        for wrong in ["pw2", "Pw1", "pw", "pw1 ", ""] {
            let result = credentials.authenticate("alice", wrong).await;
            assert!(
                matches!(result, Err(AuthError::InvalidCredentials)),
                "password {:?} should be rejected",
                wrong
            );
        }
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user() {
        let (credentials, _) = setup();
        let result = credentials.authenticate("ghost", "pw").await;
        assert!(matches!(result, Err(AuthError::UnknownUser)));

        let result = credentials.authenticate("not a name", "pw").await;
        assert!(matches!(result, Err(AuthError::UnknownUser)));
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let (credentials, _) = setup();
        credentials.register("alice", "pw1").await.unwrap();
        credentials.register("bob", "pw2").await.unwrap();

        assert!(credentials.authenticate("alice", "pw1").await.is_ok());
        assert!(credentials.authenticate("bob", "pw2").await.is_ok());
        assert!(matches!(
            credentials.authenticate("bob", "pw1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
