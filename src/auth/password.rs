//! Salted password hashing with Argon2id.
//!
//! A credential is a 16-byte random salt plus a 32-byte Argon2id digest of the
//! password under that salt, both stored as standard base64 alongside the
//! parameters used to derive them.

use crate::error::AuthError;
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 16;
pub const HASH_LEN: usize = 32;

/// Fixed salt for the decoy hash computed when a login names an unknown user.
const DECOY_SALT: [u8; SALT_LEN] = *b"sharebox-decoy!!";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordParams {
    /// OWASP recommended baseline: m=19456 (19 MiB), t=2, p=1.
    fn default() -> Self {
        PasswordParams {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordParams {
    fn argon2(&self) -> Result<Argon2<'static>, String> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(HASH_LEN),
        )
        .map_err(|e| format!("Argon2 params: {}", e))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Check that Argon2 accepts these parameters.
    pub fn validate(&self) -> Result<(), String> {
        self.argon2().map(|_| ())
    }
}

/// A derived credential ready to be stored.
#[derive(Clone)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
    pub params: PasswordParams,
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill(&mut salt);
    salt
}

/// Derive the password digest for `salt`.
pub fn derive(
    password: &[u8],
    salt: &[u8],
    params: &PasswordParams,
) -> Result<Zeroizing<[u8; HASH_LEN]>, AuthError> {
    let argon2 = params.argon2().map_err(AuthError::Hashing)?;
    let mut out = Zeroizing::new([0u8; HASH_LEN]);
    argon2
        .hash_password_into(password, salt, &mut out[..])
        .map_err(|e| AuthError::Hashing(format!("Argon2 hash: {}", e)))?;
    Ok(out)
}

/// Hash a new password under a fresh salt.
pub fn hash_new(password: &[u8], params: &PasswordParams) -> Result<HashedPassword, AuthError> {
    let salt = generate_salt();
    let digest = derive(password, &salt, params)?;
    Ok(HashedPassword {
        hash: general_purpose::STANDARD.encode(&digest[..]),
        salt: general_purpose::STANDARD.encode(salt),
        params: *params,
    })
}

/// Check `password` against a stored base64 hash and salt.
pub fn verify(
    password: &[u8],
    stored_hash: &str,
    stored_salt: &str,
    params: &PasswordParams,
) -> Result<bool, AuthError> {
    let salt = general_purpose::STANDARD
        .decode(stored_salt)
        .map_err(|e| AuthError::Hashing(format!("Stored salt is not base64: {}", e)))?;
    let expected = Zeroizing::new(
        general_purpose::STANDARD
            .decode(stored_hash)
            .map_err(|e| AuthError::Hashing(format!("Stored hash is not base64: {}", e)))?,
    );

    let digest = derive(password, &salt, params)?;
    Ok(constant_time_eq(&digest[..], &expected))
}

/// Spend the same work as a real verification, for unknown usernames.
pub fn decoy_verify(password: &[u8], params: &PasswordParams) {
    let _ = derive(password, &DECOY_SALT, params);
}

/// Compare two byte slices without an early exit on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Run [`hash_new`] on the blocking pool.
pub async fn hash_new_blocking(
    password: Zeroizing<String>,
    params: PasswordParams,
) -> Result<HashedPassword, AuthError> {
    tokio::task::spawn_blocking(move || hash_new(password.as_bytes(), &params))
        .await
        .map_err(|e| AuthError::Hashing(format!("Hashing task failed: {}", e)))?
}

/// Run [`verify`] (or [`decoy_verify`] when `stored` is `None`) on the blocking pool.
///
/// Returns false for the decoy path.
pub async fn verify_blocking(
    password: Zeroizing<String>,
    stored: Option<(String, String, PasswordParams)>,
    decoy_params: PasswordParams,
) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || match stored {
        Some((hash, salt, params)) => verify(password.as_bytes(), &hash, &salt, &params),
        None => {
            decoy_verify(password.as_bytes(), &decoy_params);
            Ok(false)
        }
    })
    .await
    .map_err(|e| AuthError::Hashing(format!("Hashing task failed: {}", e)))?
}
