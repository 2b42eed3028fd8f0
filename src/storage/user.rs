//! User Redis operations.
//!
//! Redis key patterns:
//! - `user:{username}`: user credentials (JSON)
//!
//! Usernames are validated before they reach this module, so the key suffix
//! is restricted to `[A-Za-z0-9_-]`.
//!
//! ## Security: Zeroizing Sensitive Data
//!
//! User JSON carries the password hash and salt. The raw JSON string read from
//! Redis is wrapped in `Zeroizing` so it is cleared once deserialized.

use super::StoreError;
use crate::models::StoredUser;
use redis::AsyncCommands;
use zeroize::Zeroizing;

fn user_key(username: &str) -> String {
    format!("user:{}", username)
}

/// Store a user unless the username is taken.
///
/// Uses `SET NX`, so the existence check and the insert are one operation:
/// two concurrent registrations of the same name cannot both succeed.
/// Returns false when the username already exists.
pub async fn insert_user<C>(con: &mut C, user: &StoredUser) -> Result<bool, StoreError>
where
    C: AsyncCommands,
{
    let json = Zeroizing::new(serde_json::to_string(user)?);
    let inserted: bool = con.set_nx(user_key(&user.username), json.as_str()).await?;
    Ok(inserted)
}

/// Get a user by username.
pub async fn get_user<C>(con: &mut C, username: &str) -> Result<Option<StoredUser>, StoreError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(user_key(username)).await?;

    match json {
        Some(data) => {
            let zeroizing_data = Zeroizing::new(data);
            let user = serde_json::from_str(&zeroizing_data)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}
