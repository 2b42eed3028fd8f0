//! Per-file access control.
//!
//! A file is readable by its owner and by every user in its sharing set.
//! Only the owner may extend that set, and it only ever grows. Lookups on
//! behalf of a caller search that caller's visible files only, so an existing
//! but hidden file and a missing one produce the same error.

use crate::error::AuthError;
use crate::models::{FileRecord, StoredFile};
use crate::storage::Store;
use crate::validate;
use std::collections::BTreeMap;

/// True iff `requester` owns `file` or is in its sharing set.
pub fn can_read(file: &FileRecord, requester: &str) -> bool {
    !requester.is_empty() && (file.owner == requester || file.shared_with.contains(requester))
}

#[derive(Clone)]
pub struct AccessControl<S> {
    store: S,
    storage_root: String,
}

impl<S: Store> AccessControl<S> {
    pub fn new(store: S, storage_root: impl Into<String>) -> Self {
        AccessControl {
            store,
            storage_root: storage_root.into(),
        }
    }

    async fn with_grantees(&self, file: StoredFile) -> Result<FileRecord, AuthError> {
        let shared_with = self.store.grantees(file.id).await?;
        Ok(FileRecord::from_stored(file, shared_with))
    }

    /// Record a new upload for `owner` under an owner-scoped path.
    ///
    /// Registering a name the owner already has returns the existing record.
    pub async fn register_upload(
        &self,
        owner: &str,
        filename: &str,
    ) -> Result<FileRecord, AuthError> {
        validate::validate_filename(filename).map_err(AuthError::InvalidInput)?;

        let path = format!("{}/{}/{}", self.storage_root, owner, nanoid::nanoid!(16));
        let inserted = self
            .store
            .insert_file(owner, filename, &path, crate::unix_now())
            .await?;

        if inserted.created {
            tracing::info!(
                action = "file_registered",
                owner = %owner,
                file_id = inserted.file.id,
                "File registered"
            );
        }

        self.with_grantees(inserted.file).await
    }

    /// Every file `requester` owns or has been granted, ordered by id.
    pub async fn list_visible(&self, requester: &str) -> Result<Vec<FileRecord>, AuthError> {
        if requester.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id = BTreeMap::new();
        for file in self.store.list_owned_files(requester).await? {
            by_id.insert(file.id, file);
        }
        for file in self.store.list_shared_files(requester).await? {
            by_id.entry(file.id).or_insert(file);
        }

        let mut visible = Vec::with_capacity(by_id.len());
        for file in by_id.into_values() {
            let record = self.with_grantees(file).await?;
            if can_read(&record, requester) {
                visible.push(record);
            }
        }
        Ok(visible)
    }

    /// Grant `grantee` read access to `owner`'s file named `filename`.
    ///
    /// Idempotent. Checks run in order: self-share, file ownership, grantee
    /// existence.
    pub async fn share(&self, owner: &str, filename: &str, grantee: &str) -> Result<(), AuthError> {
        if owner == grantee {
            return Err(AuthError::SelfShare);
        }

        let file = match validate::validate_filename(filename) {
            Ok(()) => self.store.get_owned_file(owner, filename).await?,
            Err(_) => None,
        }
        .ok_or(AuthError::ResourceNotFound)?;

        let grantee_exists = validate::validate_username(grantee).is_ok()
            && self.store.get_user(grantee).await?.is_some();
        if !grantee_exists {
            return Err(AuthError::UnknownGrantee);
        }

        if self.store.add_grantee(file.id, grantee).await? {
            tracing::info!(
                action = "file_shared",
                owner = %owner,
                grantee = %grantee,
                file_id = file.id,
                "File shared"
            );
        }
        Ok(())
    }

    /// Resolve `filename` among the files visible to `requester`.
    ///
    /// The requester's own file wins a name clash; otherwise the shared file
    /// with the lowest id is returned. Anything else is `NotFound`.
    pub async fn resolve_for_download(
        &self,
        requester: &str,
        filename: &str,
    ) -> Result<FileRecord, AuthError> {
        if requester.is_empty() || validate::validate_filename(filename).is_err() {
            return Err(AuthError::NotFound);
        }

        let file = match self.store.get_owned_file(requester, filename).await? {
            Some(file) => Some(file),
            None => self
                .store
                .list_shared_files(requester)
                .await?
                .into_iter()
                .filter(|f| f.filename == filename)
                .min_by_key(|f| f.id),
        };

        let record = match file {
            Some(file) => self.with_grantees(file).await?,
            None => return Err(AuthError::NotFound),
        };

        if !can_read(&record, requester) {
            return Err(AuthError::NotFound);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordParams;
    use crate::models::StoredUser;
    use crate::storage::MemoryStore;
    use std::collections::BTreeSet;

    async fn setup(users: &[&str]) -> AccessControl<MemoryStore> {
        let store = MemoryStore::new();
        for name in users {
            store
                .insert_user(&StoredUser {
                    username: name.to_string(),
                    password_hash: String::new(),
                    salt: String::new(),
                    params: PasswordParams::default(),
                    created_at: 0,
                })
                .await
                .unwrap();
        }
        AccessControl::new(store, "files")
    }

    fn record(owner: &str, shared: &[&str]) -> FileRecord {
        FileRecord {
            id: 1,
            owner: owner.to_string(),
            path: "files/x/y".to_string(),
            filename: "a.txt".to_string(),
            shared_with: shared.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn names(files: &[FileRecord]) -> Vec<&str> {
        files.iter().map(|f| f.filename.as_str()).collect()
    }

    #[test]
    fn test_can_read() {
        let file = record("alice", &["bob"]);
        assert!(can_read(&file, "alice"));
        assert!(can_read(&file, "bob"));
        assert!(!can_read(&file, "carol"));
        assert!(!can_read(&file, ""));
    }

    #[tokio::test]
    async fn test_register_upload_path_is_owner_scoped() {
        let access = setup(&["alice"]).await;
        let file = access.register_upload("alice", "a.txt").await.unwrap();

        assert_eq!(file.owner, "alice");
        assert_eq!(file.filename, "a.txt");
        assert!(file.path.starts_with("files/alice/"));
        assert!(!file.path.contains("a.txt"));
        assert!(file.shared_with.is_empty());
    }

    #[tokio::test]
    async fn test_register_upload_same_name_returns_existing() {
        let access = setup(&["alice"]).await;
        let first = access.register_upload("alice", "a.txt").await.unwrap();
        let again = access.register_upload("alice", "a.txt").await.unwrap();
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_register_upload_rejects_bad_names() {
        let access = setup(&["alice"]).await;
        for bad in ["", "..", "../x", "a/b"] {
            assert!(matches!(
                access.register_upload("alice", bad).await,
                Err(AuthError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_share_flow() {
        let access = setup(&["alice", "bob", "carol"]).await;
        access.register_upload("alice", "a.txt").await.unwrap();

        assert_eq!(
            names(&access.list_visible("bob").await.unwrap()),
            Vec::<&str>::new()
        );

        access.share("alice", "a.txt", "bob").await.unwrap();

        let bob_view = access.list_visible("bob").await.unwrap();
        assert_eq!(names(&bob_view), vec!["a.txt"]);
        assert_eq!(
            bob_view[0].shared_with,
            ["bob".to_string()].into_iter().collect::<BTreeSet<_>>()
        );
        assert!(access.list_visible("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_share_is_idempotent() {
        let access = setup(&["alice", "bob"]).await;
        access.register_upload("alice", "a.txt").await.unwrap();

        access.share("alice", "a.txt", "bob").await.unwrap();
        access.share("alice", "a.txt", "bob").await.unwrap();

        let files = access.list_visible("alice").await.unwrap();
        assert_eq!(files[0].shared_with.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_shares_are_all_kept() {
        let grantees: Vec<String> = (0..8).map(|i| format!("user{}", i)).collect();
        let mut users: Vec<&str> = grantees.iter().map(String::as_str).collect();
        users.push("alice");
        let access = setup(&users).await;
        access.register_upload("alice", "a.txt").await.unwrap();

        let mut handles = Vec::new();
        for grantee in grantees.clone() {
            let access = access.clone();
            handles.push(tokio::spawn(async move {
                access.share("alice", "a.txt", &grantee).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let file = access.resolve_for_download("alice", "a.txt").await.unwrap();
        assert_eq!(file.shared_with.len(), grantees.len());
        for grantee in &grantees {
            assert!(can_read(&file, grantee));
        }
    }

    #[tokio::test]
    async fn test_grantee_names_match_exactly() {
        let access = setup(&["alice", "bob", "bobby"]).await;
        access.register_upload("alice", "a.txt").await.unwrap();
        access.share("alice", "a.txt", "bobby").await.unwrap();

        let file = access.resolve_for_download("bobby", "a.txt").await.unwrap();
        assert!(can_read(&file, "bobby"));
        assert!(!can_read(&file, "bob"));
        assert!(!can_read(&file, "obby"));
        assert!(matches!(
            access.resolve_for_download("bob", "a.txt").await,
            Err(AuthError::NotFound)
        ));
        assert!(access.list_visible("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_share_error_order() {
        let access = setup(&["alice", "bob"]).await;
        access.register_upload("alice", "a.txt").await.unwrap();

        // Self-share is rejected before anything else is looked up
        assert!(matches!(
            access.share("alice", "missing.txt", "alice").await,
            Err(AuthError::SelfShare)
        ));
        assert!(matches!(
            access.share("alice", "missing.txt", "ghost").await,
            Err(AuthError::ResourceNotFound)
        ));
        assert!(matches!(
            access.share("alice", "a.txt", "ghost").await,
            Err(AuthError::UnknownGrantee)
        ));
    }

    #[tokio::test]
    async fn test_only_owner_can_share() {
        let access = setup(&["alice", "bob", "carol"]).await;
        access.register_upload("alice", "a.txt").await.unwrap();
        access.share("alice", "a.txt", "bob").await.unwrap();

        // A grantee does not own the file, so it cannot re-share it
        assert!(matches!(
            access.share("bob", "a.txt", "carol").await,
            Err(AuthError::ResourceNotFound)
        ));
        assert!(access.list_visible("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_visible_is_ordered_union() {
        let access = setup(&["alice", "bob"]).await;
        access.register_upload("alice", "first.txt").await.unwrap();
        access.register_upload("bob", "second.txt").await.unwrap();
        access.register_upload("alice", "third.txt").await.unwrap();
        access.share("bob", "second.txt", "alice").await.unwrap();

        let files = access.list_visible("alice").await.unwrap();
        assert_eq!(names(&files), vec!["first.txt", "second.txt", "third.txt"]);
        assert!(files.windows(2).all(|w| w[0].id < w[1].id));
        assert!(access.list_visible("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_for_download() {
        let access = setup(&["alice", "bob", "carol"]).await;
        let file = access.register_upload("alice", "a.txt").await.unwrap();
        access.share("alice", "a.txt", "bob").await.unwrap();

        assert_eq!(
            access.resolve_for_download("alice", "a.txt").await.unwrap().id,
            file.id
        );
        assert_eq!(
            access.resolve_for_download("bob", "a.txt").await.unwrap().id,
            file.id
        );
        assert!(matches!(
            access.resolve_for_download("carol", "a.txt").await,
            Err(AuthError::NotFound)
        ));
        assert!(matches!(
            access.resolve_for_download("alice", "nope.txt").await,
            Err(AuthError::NotFound)
        ));
        assert!(matches!(
            access.resolve_for_download("", "a.txt").await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_resolve_prefers_own_file() {
        let access = setup(&["alice", "bob", "carol"]).await;
        let alices = access.register_upload("alice", "report.pdf").await.unwrap();
        let carols = access.register_upload("carol", "report.pdf").await.unwrap();
        let bobs = access.register_upload("bob", "report.pdf").await.unwrap();
        access.share("alice", "report.pdf", "bob").await.unwrap();
        access.share("carol", "report.pdf", "bob").await.unwrap();
        access.share("carol", "report.pdf", "alice").await.unwrap();

        assert_eq!(
            access.resolve_for_download("bob", "report.pdf").await.unwrap().id,
            bobs.id
        );
        assert_eq!(
            access.resolve_for_download("alice", "report.pdf").await.unwrap().id,
            alices.id
        );
        assert!(carols.id > alices.id);
    }

    #[tokio::test]
    async fn test_resolve_lowest_shared_id_wins() {
        let access = setup(&["alice", "bob", "carol"]).await;
        let alices = access.register_upload("alice", "report.pdf").await.unwrap();
        access.register_upload("carol", "report.pdf").await.unwrap();
        access.share("carol", "report.pdf", "bob").await.unwrap();
        access.share("alice", "report.pdf", "bob").await.unwrap();

        assert_eq!(
            access.resolve_for_download("bob", "report.pdf").await.unwrap().id,
            alices.id
        );
    }
}
