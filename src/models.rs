//! Request and response models for the API.
//!
//! All models use serde for serialization/deserialization.
//! Storage models represent the records kept by a [`crate::storage::Store`].

use crate::auth::password::PasswordParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Storage Models
// ============================================================================

/// User credentials as stored.
///
/// `password_hash` and `salt` are standard base64. `params` records the cost
/// the hash was derived with, so changing the configured cost later does not
/// lock existing users out.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub params: PasswordParams,
    pub created_at: u64,
}

impl std::fmt::Debug for StoredUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredUser")
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("salt", &"[REDACTED]")
            .field("params", &self.params)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Session as stored. Timestamps are unix seconds.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: String,
    pub username: String,
    pub token: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl StoredSession {
    /// Expiry is inclusive: a session is dead from `expires_at` onward.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// File metadata as stored. The sharing set is kept apart from this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: u64,
    pub owner: String,
    pub path: String,
    pub filename: String,
    pub created_at: u64,
}

/// A file together with its sharing set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: u64,
    pub owner: String,
    pub path: String,
    pub filename: String,
    pub shared_with: BTreeSet<String>,
}

impl FileRecord {
    pub fn from_stored(file: StoredFile, shared_with: BTreeSet<String>) -> Self {
        FileRecord {
            id: file.id,
            owner: file.owner,
            path: file.path,
            filename: file.filename,
            shared_with,
        }
    }
}

// ============================================================================
// Auth Models
// ============================================================================

/// Username/password body for registration and login.
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Response after registration or login. The token itself travels in the cookie.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub username: String,
    pub expires_at: u64,
}

/// Response for `GET /api/me`.
#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub username: String,
}

// ============================================================================
// File Models
// ============================================================================

/// Request to register an upload.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
}

/// Request to share one of the caller's files.
#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub filename: String,
    pub username: String,
}

/// File info returned to a caller.
///
/// `shared_with` is only filled in for the owner.
#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub id: u64,
    pub filename: String,
    pub owner: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with: Option<Vec<String>>,
}

impl FileInfo {
    pub fn for_viewer(record: FileRecord, viewer: &str) -> Self {
        let shared_with = if record.owner == viewer {
            Some(record.shared_with.into_iter().collect())
        } else {
            None
        };
        FileInfo {
            id: record.id,
            filename: record.filename,
            owner: record.owner,
            path: record.path,
            shared_with,
        }
    }
}
