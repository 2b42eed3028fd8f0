//! Authentication layer: password hashing, credentials, sessions and request identity.

pub mod cookie;
pub mod credentials;
pub mod middleware;
pub mod password;
pub mod session;

pub use credentials::CredentialStore;
pub use middleware::{
    caller_username, check_rate_limit, resolve_identity, AppState, AuthenticatedUser, Identity,
    RequireUser,
};
pub use session::{generate_session_token, SessionManager, SessionToken};
