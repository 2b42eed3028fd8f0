//! File metadata and sharing Redis operations.
//!
//! Redis key patterns:
//! - `file:next_id`: id counter (INCR)
//! - `file:{id}`: file record (JSON)
//! - `owner_files:{owner}`: HASH filename -> id
//! - `file_shares:{id}`: SET of grantee usernames
//! - `shared_files:{grantee}`: SET of file ids shared with the grantee
//!
//! Filenames are only ever used as hash fields or JSON values, never as part
//! of a key or a script body.

use super::{InsertedFile, StoreError};
use crate::models::StoredFile;
use redis::AsyncCommands;
use std::collections::{BTreeSet, HashMap};

const NEXT_ID_KEY: &str = "file:next_id";

fn file_key(id: u64) -> String {
    format!("file:{}", id)
}

fn owner_files_key(owner: &str) -> String {
    format!("owner_files:{}", owner)
}

fn file_shares_key(id: u64) -> String {
    format!("file_shares:{}", id)
}

fn shared_files_key(grantee: &str) -> String {
    format!("shared_files:{}", grantee)
}

/// Insert a file record unless the owner already has one with this filename.
///
/// A fresh id is drawn first; the Lua script then claims the filename with
/// `HSETNX` and writes the record only if the claim succeeded. An id drawn
/// for a losing insert is simply never used.
pub async fn insert_file<C>(
    con: &mut C,
    owner: &str,
    filename: &str,
    path: &str,
    created_at: u64,
) -> Result<InsertedFile, StoreError>
where
    C: AsyncCommands,
{
    let id: u64 = con.incr(NEXT_ID_KEY, 1).await?;
    let file = StoredFile {
        id,
        owner: owner.to_string(),
        path: path.to_string(),
        filename: filename.to_string(),
        created_at,
    };
    let json = serde_json::to_string(&file)?;

    let script = redis::Script::new(
        r"
        if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 1 then
            redis.call('SET', KEYS[2], ARGV[3])
            return ARGV[2]
        end
        return redis.call('HGET', KEYS[1], ARGV[1])
        ",
    );

    let winner: String = script
        .key(owner_files_key(owner))
        .key(file_key(id))
        .arg(filename)
        .arg(id.to_string())
        .arg(json)
        .invoke_async(con)
        .await?;

    let winner_id: u64 = winner
        .parse()
        .map_err(|_| StoreError::Backend(format!("Invalid file id in owner index: {}", winner)))?;

    if winner_id == id {
        return Ok(InsertedFile {
            file,
            created: true,
        });
    }

    let existing = get_file(con, winner_id)
        .await?
        .ok_or_else(|| StoreError::Backend(format!("Dangling file id {}", winner_id)))?;

    Ok(InsertedFile {
        file: existing,
        created: false,
    })
}

/// Get a file record by id.
pub async fn get_file<C>(con: &mut C, id: u64) -> Result<Option<StoredFile>, StoreError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(file_key(id)).await?;
    match json {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

/// Fetch several file records, skipping ids whose record is gone.
async fn get_files<C>(con: &mut C, ids: &[u64]) -> Result<Vec<StoredFile>, StoreError>
where
    C: AsyncCommands,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<String> = ids.iter().map(|id| file_key(*id)).collect();
    let values: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(con).await?;

    let mut files = Vec::with_capacity(values.len());
    for data in values.into_iter().flatten() {
        files.push(serde_json::from_str(&data)?);
    }
    Ok(files)
}

/// Get the file `owner` uploaded under `filename`.
pub async fn get_owned_file<C>(
    con: &mut C,
    owner: &str,
    filename: &str,
) -> Result<Option<StoredFile>, StoreError>
where
    C: AsyncCommands,
{
    let id: Option<u64> = con.hget(owner_files_key(owner), filename).await?;
    match id {
        Some(id) => get_file(con, id).await,
        None => Ok(None),
    }
}

/// List all files owned by `owner`.
pub async fn list_owned_files<C>(con: &mut C, owner: &str) -> Result<Vec<StoredFile>, StoreError>
where
    C: AsyncCommands,
{
    let index: HashMap<String, u64> = con.hgetall(owner_files_key(owner)).await?;
    let ids: Vec<u64> = index.into_values().collect();
    get_files(con, &ids).await
}

/// List all files shared with `grantee`.
pub async fn list_shared_files<C>(
    con: &mut C,
    grantee: &str,
) -> Result<Vec<StoredFile>, StoreError>
where
    C: AsyncCommands,
{
    let ids: Vec<u64> = con.smembers(shared_files_key(grantee)).await?;
    get_files(con, &ids).await
}

/// Add `grantee` to a file's sharing set.
///
/// Both the forward set and the reverse index are updated with `SADD` inside
/// one MULTI block, so concurrent shares never lose an update and repeating
/// a share changes nothing. Returns true if the grantee was newly added.
pub async fn add_grantee<C>(con: &mut C, file_id: u64, grantee: &str) -> Result<bool, StoreError>
where
    C: AsyncCommands,
{
    let (added, _): (i64, i64) = redis::pipe()
        .atomic()
        .sadd(file_shares_key(file_id), grantee)
        .sadd(shared_files_key(grantee), file_id)
        .query_async(con)
        .await?;

    Ok(added > 0)
}

/// Get a file's sharing set.
pub async fn grantees<C>(con: &mut C, file_id: u64) -> Result<BTreeSet<String>, StoreError>
where
    C: AsyncCommands,
{
    let members: BTreeSet<String> = con.smembers(file_shares_key(file_id)).await?;
    Ok(members)
}
