//! Storage layer for users, sessions, files and counters.
//!
//! Everything the auth core persists goes through the [`Store`] trait, so the
//! core never holds a process-wide handle. Two backends exist:
//! - [`RedisStore`]: production backend. Per-entity Redis operations live in
//!   [`user`], [`session`] and [`file`], generic over `redis::AsyncCommands`.
//! - [`MemoryStore`]: single-process backend for tests and local runs.
//!
//! Each mutating method is atomic on its own: uniqueness checks and inserts are
//! one store operation, and set membership is changed with set-add primitives.

pub mod file;
pub mod memory;
pub mod session;
pub mod user;

pub use memory::MemoryStore;

use crate::models::{StoredFile, StoredSession, StoredUser};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::BTreeSet;
use std::future::Future;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result of [`Store::insert_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedFile {
    pub file: StoredFile,
    /// False when the owner already had a file with that name.
    pub created: bool,
}

/// Persistence used by the credential, session and access-control components.
pub trait Store: Clone + Send + Sync + 'static {
    /// Insert a user unless the username exists. Returns false when taken.
    fn insert_user(
        &self,
        user: &StoredUser,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn get_user(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<StoredUser>, StoreError>> + Send;

    /// Insert a session unless its token is already in use. Returns false on collision.
    fn insert_session(
        &self,
        session: &StoredSession,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn get_session(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<StoredSession>, StoreError>> + Send;

    /// Delete the session matching both `username` and `token`.
    /// Returns true if a row was deleted.
    fn delete_session(
        &self,
        username: &str,
        token: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Delete every session of `username`. Returns the number deleted.
    fn delete_user_sessions(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Allocate an id and insert a file record unless `owner` already has
    /// `filename`, in which case the existing record is returned.
    fn insert_file(
        &self,
        owner: &str,
        filename: &str,
        path: &str,
        created_at: u64,
    ) -> impl Future<Output = Result<InsertedFile, StoreError>> + Send;

    fn get_owned_file(
        &self,
        owner: &str,
        filename: &str,
    ) -> impl Future<Output = Result<Option<StoredFile>, StoreError>> + Send;

    fn list_owned_files(
        &self,
        owner: &str,
    ) -> impl Future<Output = Result<Vec<StoredFile>, StoreError>> + Send;

    /// Files whose sharing set contains `grantee`.
    fn list_shared_files(
        &self,
        grantee: &str,
    ) -> impl Future<Output = Result<Vec<StoredFile>, StoreError>> + Send;

    /// Atomic set-add of `grantee` to the file's sharing set.
    /// Returns true if the grantee was newly added.
    fn add_grantee(
        &self,
        file_id: u64,
        grantee: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn grantees(
        &self,
        file_id: u64,
    ) -> impl Future<Output = Result<BTreeSet<String>, StoreError>> + Send;

    /// Increment a fixed-window counter and return the count in the current window.
    fn hit_counter(
        &self,
        key: &str,
        window_secs: u64,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send;
}

/// Redis-backed store.
///
/// Holds one `ConnectionManager`. Clones share the multiplexed connection,
/// and the manager reconnects on its own after a dropped link.
#[derive(Clone)]
pub struct RedisStore {
    con: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis at `url`. Fails if the first connection cannot be made.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let con = ConnectionManager::new(client).await?;
        Ok(RedisStore { con })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        Ok(self.con.clone())
    }

    /// Round-trip a PING to check connectivity at startup.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut con).await?;
        Ok(())
    }
}

impl Store for RedisStore {
    async fn insert_user(&self, user: &StoredUser) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        user::insert_user(&mut con, user).await
    }

    async fn get_user(&self, username: &str) -> Result<Option<StoredUser>, StoreError> {
        let mut con = self.connection().await?;
        user::get_user(&mut con, username).await
    }

    async fn insert_session(&self, session: &StoredSession) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        session::insert_session(&mut con, session).await
    }

    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, StoreError> {
        let mut con = self.connection().await?;
        session::get_session(&mut con, token).await
    }

    async fn delete_session(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        session::delete_session(&mut con, username, token).await
    }

    async fn delete_user_sessions(&self, username: &str) -> Result<usize, StoreError> {
        let mut con = self.connection().await?;
        session::delete_user_sessions(&mut con, username).await
    }

    async fn insert_file(
        &self,
        owner: &str,
        filename: &str,
        path: &str,
        created_at: u64,
    ) -> Result<InsertedFile, StoreError> {
        let mut con = self.connection().await?;
        file::insert_file(&mut con, owner, filename, path, created_at).await
    }

    async fn get_owned_file(
        &self,
        owner: &str,
        filename: &str,
    ) -> Result<Option<StoredFile>, StoreError> {
        let mut con = self.connection().await?;
        file::get_owned_file(&mut con, owner, filename).await
    }

    async fn list_owned_files(&self, owner: &str) -> Result<Vec<StoredFile>, StoreError> {
        let mut con = self.connection().await?;
        file::list_owned_files(&mut con, owner).await
    }

    async fn list_shared_files(&self, grantee: &str) -> Result<Vec<StoredFile>, StoreError> {
        let mut con = self.connection().await?;
        file::list_shared_files(&mut con, grantee).await
    }

    async fn add_grantee(&self, file_id: u64, grantee: &str) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        file::add_grantee(&mut con, file_id, grantee).await
    }

    async fn grantees(&self, file_id: u64) -> Result<BTreeSet<String>, StoreError> {
        let mut con = self.connection().await?;
        file::grantees(&mut con, file_id).await
    }

    async fn hit_counter(&self, key: &str, window_secs: u64) -> Result<u32, StoreError> {
        let mut con = self.connection().await?;
        hit_counter(&mut con, key, window_secs).await
    }
}

/// Fixed-window counter using Redis INCR with TTL.
///
/// The TTL is set on the first hit of a window, so the key disappears
/// `window_secs` after the window opened.
pub async fn hit_counter<C>(con: &mut C, key: &str, window_secs: u64) -> Result<u32, StoreError>
where
    C: AsyncCommands,
{
    let count: u32 = con.incr(key, 1).await?;

    if count == 1 {
        con.expire::<_, ()>(key, window_secs as i64).await?;
    }

    Ok(count)
}

/// Redis test helpers. Tests skip themselves when no Redis is reachable.
#[cfg(test)]
pub(crate) mod test_support {
    use super::RedisStore;

    pub async fn redis_store() -> Option<RedisStore> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let store = match RedisStore::open(&redis_url).await {
            Ok(s) => s,
            Err(_) => {
                eprintln!("Skipping test: Redis not available");
                return None;
            }
        };

        match store.ping().await {
            Ok(()) => Some(store),
            Err(_) => {
                eprintln!("Skipping test: Redis connection failed");
                None
            }
        }
    }

    /// Unique suffix so concurrent test runs do not collide on keys.
    pub fn unique(prefix: &str) -> String {
        format!("{}-{}", prefix, nanoid::nanoid!(8))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{redis_store, unique};
    use super::*;

    #[tokio::test]
    async fn test_redis_hit_counter() {
        let Some(store) = redis_store().await else {
            return;
        };
        let key = unique("test:counter");

        assert_eq!(store.hit_counter(&key, 60).await.unwrap(), 1);
        assert_eq!(store.hit_counter(&key, 60).await.unwrap(), 2);
        assert_eq!(store.hit_counter(&key, 60).await.unwrap(), 3);

        let mut con = store.connection().await.unwrap();
        let _: Result<(), _> = con.del(&key).await;
    }

    #[tokio::test]
    async fn test_redis_clones_share_one_connection() {
        let Some(store) = redis_store().await else {
            return;
        };
        let key = unique("test:shared");

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store.hit_counter(&key, 60).await.unwrap()
            }));
        }
        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=20).collect::<Vec<u32>>());

        let mut con = store.connection().await.unwrap();
        let _: Result<(), _> = con.del(&key).await;
    }

    #[tokio::test]
    async fn test_redis_user_insert_is_unique() {
        let Some(store) = redis_store().await else {
            return;
        };
        let username = unique("user");
        let user = StoredUser {
            username: username.clone(),
            password_hash: "aGFzaA==".to_string(),
            salt: "c2FsdA==".to_string(),
            params: crate::auth::password::PasswordParams::default(),
            created_at: 1,
        };

        assert!(store.insert_user(&user).await.unwrap());
        assert!(!store.insert_user(&user).await.unwrap());
        let fetched = store.get_user(&username).await.unwrap().unwrap();
        assert_eq!(fetched.username, username);

        let mut con = store.connection().await.unwrap();
        let _: Result<(), _> = con.del(format!("user:{}", username)).await;
    }
}
