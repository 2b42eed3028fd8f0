//! In-process store.
//!
//! All state sits behind one async mutex, so every trait method is a single
//! critical section. Used by the test suite and for running without Redis.

use super::{InsertedFile, Store, StoreError};
use crate::models::{StoredFile, StoredSession, StoredUser};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, StoredUser>,
    sessions: HashMap<String, StoredSession>,
    user_sessions: HashMap<String, BTreeSet<String>>,
    files: BTreeMap<u64, StoredFile>,
    owner_files: HashMap<String, HashMap<String, u64>>,
    file_shares: HashMap<u64, BTreeSet<String>>,
    shared_files: HashMap<String, BTreeSet<u64>>,
    next_file_id: u64,
    // key -> (window start, count)
    counters: HashMap<String, (u64, u32)>,
}

/// Store backed by process memory. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn insert_user(&self, user: &StoredUser) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.username) {
            return Ok(false);
        }
        state.users.insert(user.username.clone(), user.clone());
        Ok(true)
    }

    async fn get_user(&self, username: &str) -> Result<Option<StoredUser>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.get(username).cloned())
    }

    async fn insert_session(&self, session: &StoredSession) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.sessions.contains_key(&session.token) {
            return Ok(false);
        }
        state
            .sessions
            .insert(session.token.clone(), session.clone());
        state
            .user_sessions
            .entry(session.username.clone())
            .or_default()
            .insert(session.token.clone());
        Ok(true)
    }

    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.sessions.get(token).cloned())
    }

    async fn delete_session(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let owned = state
            .sessions
            .get(token)
            .is_some_and(|s| s.username == username);
        if !owned {
            return Ok(false);
        }
        state.sessions.remove(token);
        if let Some(tokens) = state.user_sessions.get_mut(username) {
            tokens.remove(token);
        }
        Ok(true)
    }

    async fn delete_user_sessions(&self, username: &str) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let tokens = state.user_sessions.remove(username).unwrap_or_default();
        let mut deleted = 0;
        for token in tokens {
            if state.sessions.remove(&token).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn insert_file(
        &self,
        owner: &str,
        filename: &str,
        path: &str,
        created_at: u64,
    ) -> Result<InsertedFile, StoreError> {
        let mut state = self.state.lock().await;

        let existing = state
            .owner_files
            .get(owner)
            .and_then(|names| names.get(filename))
            .copied();
        if let Some(id) = existing {
            let file = state
                .files
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::Backend(format!("Dangling file id {}", id)))?;
            return Ok(InsertedFile {
                file,
                created: false,
            });
        }

        state.next_file_id += 1;
        let file = StoredFile {
            id: state.next_file_id,
            owner: owner.to_string(),
            path: path.to_string(),
            filename: filename.to_string(),
            created_at,
        };
        state
            .owner_files
            .entry(owner.to_string())
            .or_default()
            .insert(filename.to_string(), file.id);
        state.files.insert(file.id, file.clone());

        Ok(InsertedFile {
            file,
            created: true,
        })
    }

    async fn get_owned_file(
        &self,
        owner: &str,
        filename: &str,
    ) -> Result<Option<StoredFile>, StoreError> {
        let state = self.state.lock().await;
        let file = state
            .owner_files
            .get(owner)
            .and_then(|names| names.get(filename))
            .and_then(|id| state.files.get(id))
            .cloned();
        Ok(file)
    }

    async fn list_owned_files(&self, owner: &str) -> Result<Vec<StoredFile>, StoreError> {
        let state = self.state.lock().await;
        let files = state
            .owner_files
            .get(owner)
            .map(|names| {
                names
                    .values()
                    .filter_map(|id| state.files.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(files)
    }

    async fn list_shared_files(&self, grantee: &str) -> Result<Vec<StoredFile>, StoreError> {
        let state = self.state.lock().await;
        let files = state
            .shared_files
            .get(grantee)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.files.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(files)
    }

    async fn add_grantee(&self, file_id: u64, grantee: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let added = state
            .file_shares
            .entry(file_id)
            .or_default()
            .insert(grantee.to_string());
        state
            .shared_files
            .entry(grantee.to_string())
            .or_default()
            .insert(file_id);
        Ok(added)
    }

    async fn grantees(&self, file_id: u64) -> Result<BTreeSet<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.file_shares.get(&file_id).cloned().unwrap_or_default())
    }

    async fn hit_counter(&self, key: &str, window_secs: u64) -> Result<u32, StoreError> {
        let now = crate::unix_now();
        let mut state = self.state.lock().await;
        let entry = state.counters.entry(key.to_string()).or_insert((now, 0));
        if now >= entry.0 + window_secs {
            *entry = (now, 0);
        }
        entry.1 += 1;
        Ok(entry.1)
    }
}
