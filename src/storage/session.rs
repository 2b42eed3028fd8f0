//! Session Redis operations.
//!
//! Redis key patterns:
//! - `session:{token}`: session data (JSON), key expires at the session's `expires_at`
//! - `user_sessions:{username}`: SET of the user's live session tokens
//!
//! ## Security: Zeroizing Sensitive Data
//!
//! Session JSON contains the bearer token. Strings read back from Redis are
//! wrapped in `Zeroizing` and cleared after deserialization. Redis keeps its
//! own copy, so this only covers the application's memory.

use super::StoreError;
use crate::models::StoredSession;
use redis::AsyncCommands;
use zeroize::Zeroizing;

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

fn user_sessions_key(username: &str) -> String {
    format!("user_sessions:{}", username)
}

/// Store a session unless its token is already in use.
///
/// The session key is written with `NX` and an absolute `EXAT` expiry, so
/// Redis drops it on its own once the session is dead. The token is added to
/// the user's session set in the same script, so a stored session is always
/// reachable by bulk revocation.
/// Returns false on token collision.
pub async fn insert_session<C>(con: &mut C, session: &StoredSession) -> Result<bool, StoreError>
where
    C: AsyncCommands,
{
    let json = Zeroizing::new(serde_json::to_string(session)?);
    let remaining = session
        .expires_at
        .saturating_sub(crate::unix_now())
        .max(1);

    // Keep the index alive at least as long as its newest session
    let script = redis::Script::new(
        r"
        if not redis.call('SET', KEYS[1], ARGV[1], 'NX', 'EXAT', ARGV[2]) then
            return 0
        end
        redis.call('SADD', KEYS[2], ARGV[3])
        local ttl = redis.call('TTL', KEYS[2])
        local remaining = tonumber(ARGV[4])
        if ttl < remaining then
            redis.call('EXPIRE', KEYS[2], remaining)
        end
        return 1
        ",
    );

    let inserted: i32 = script
        .key(session_key(&session.token))
        .key(user_sessions_key(&session.username))
        .arg(json.as_str())
        .arg(session.expires_at)
        .arg(&session.token)
        .arg(remaining)
        .invoke_async(con)
        .await?;

    Ok(inserted == 1)
}

/// Get a session by token.
pub async fn get_session<C>(con: &mut C, token: &str) -> Result<Option<StoredSession>, StoreError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(session_key(token)).await?;

    match json {
        Some(data) => {
            let zeroizing_data = Zeroizing::new(data);
            let session = serde_json::from_str(&zeroizing_data)?;
            Ok(Some(session))
        }
        None => Ok(None),
    }
}

/// Delete the session for `token` only if it belongs to `username`.
///
/// The ownership check and the delete run in one Lua script, so a session
/// can never be removed by someone presenting another user's identity.
/// Returns true if the session was deleted.
pub async fn delete_session<C>(con: &mut C, username: &str, token: &str) -> Result<bool, StoreError>
where
    C: AsyncCommands,
{
    let script = redis::Script::new(
        r"
        local val = redis.call('GET', KEYS[1])
        if val then
            local session = cjson.decode(val)
            if session.username == ARGV[1] then
                redis.call('DEL', KEYS[1])
                redis.call('SREM', KEYS[2], ARGV[2])
                return 1
            end
        end
        return 0
        ",
    );

    let deleted: i32 = script
        .key(session_key(token))
        .key(user_sessions_key(username))
        .arg(username)
        .arg(token)
        .invoke_async(con)
        .await?;

    Ok(deleted > 0)
}

/// Delete all sessions for a user.
///
/// Enumerates the `user_sessions:{username}` set and removes each session
/// and its index entry in one script. A session inserted concurrently is
/// either deleted here or stays indexed for the next call.
/// Returns how many session keys were actually removed.
pub async fn delete_user_sessions<C>(con: &mut C, username: &str) -> Result<usize, StoreError>
where
    C: AsyncCommands,
{
    let script = redis::Script::new(
        r"
        local tokens = redis.call('SMEMBERS', KEYS[1])
        local deleted = 0
        for _, token in ipairs(tokens) do
            deleted = deleted + redis.call('DEL', ARGV[1] .. token)
            redis.call('SREM', KEYS[1], token)
        end
        return deleted
        ",
    );

    let deleted: i64 = script
        .key(user_sessions_key(username))
        .arg(session_key(""))
        .invoke_async(con)
        .await?;

    Ok(deleted.max(0) as usize)
}
