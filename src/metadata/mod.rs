//! Metadata Store - relational bookkeeping for files, fragments and key shares
//!
//! Records which remote blobs make up each stored file, plus the connected
//! storage accounts fragments can be routed to. All writes belonging to one
//! upload happen inside a single explicit transaction, so a failed upload
//! leaves no rows behind.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::remote::{StorageHandle, StorageKind};

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown storage handle: {0}")]
    UnknownStorage(i64),

    #[error("Corrupt metadata: {0}")]
    Corrupt(String),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// One stored file and its split parameters
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub file_id: Uuid,
    pub filename: String,
    pub account_id: i64,
    pub group_id: i64,
    /// Total erasure fragments (N)
    pub shard_count: u32,
    /// Fragments needed to reconstruct (K)
    pub required_shards: u32,
    /// Key shares needed to recover the key (T)
    pub key_threshold: u32,
    /// Plaintext length before encryption
    pub original_length: u64,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(
        filename: &str,
        account_id: i64,
        group_id: i64,
        shard_count: u32,
        required_shards: u32,
        key_threshold: u32,
        original_length: u64,
    ) -> Self {
        Self {
            file_id: Uuid::new_v4(),
            filename: filename.to_string(),
            account_id,
            group_id,
            shard_count,
            required_shards,
            key_threshold,
            original_length,
            created_at: Utc::now(),
        }
    }
}

/// One erasure fragment placed in a remote store
#[derive(Debug, Clone)]
pub struct FragmentRecord {
    pub shard_id: i64,
    pub file_id: Uuid,
    pub shard_index: u32,
    pub storage_id: i64,
    /// Provider-assigned blob id
    pub shard_file_id: String,
    pub folder_id: String,
    pub shard_size: u64,
}

/// One key share placed in a remote store
#[derive(Debug, Clone)]
pub struct KeyShareRecord {
    pub key_id: i64,
    pub file_id: Uuid,
    pub storage_id: i64,
    /// Provider-assigned blob id
    pub key_file_id: String,
}

/// Row counts across the store
#[derive(Debug, Clone, Copy)]
pub struct MetadataStats {
    pub files: i64,
    pub fragments: i64,
    pub key_shares: i64,
}

/// SQLite-backed store owning all file, fragment and key-share rows
#[derive(Debug)]
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    /// Open (and if needed create) the database at the given path
    pub fn open(db_path: &Path) -> MetadataResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        let store = MetadataStore { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> MetadataResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = MetadataStore { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> MetadataResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                file_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                account_id INTEGER NOT NULL,
                group_id INTEGER NOT NULL,
                shard_count INTEGER NOT NULL,
                required_shards INTEGER NOT NULL,
                key_threshold INTEGER NOT NULL DEFAULT 1,
                original_length INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS file_shards (
                shard_id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id TEXT NOT NULL REFERENCES files(file_id),
                shard_index INTEGER NOT NULL,
                storage_id INTEGER NOT NULL,
                shard_file_id TEXT NOT NULL,
                folder_id TEXT NOT NULL,
                shard_size INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS file_keys (
                key_id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id TEXT NOT NULL REFERENCES files(file_id),
                storage_id INTEGER NOT NULL,
                key_file_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS storage (
                storage_id INTEGER PRIMARY KEY AUTOINCREMENT,
                storage_type TEXT NOT NULL,
                access_token TEXT NOT NULL,
                name TEXT,
                email TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_file_shards_file ON file_shards(file_id);
            CREATE INDEX IF NOT EXISTS idx_file_keys_file ON file_keys(file_id);",
        )?;
        Ok(())
    }

    /// Start the transaction an upload runs inside
    pub fn begin(&mut self) -> MetadataResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    /// Make all rows written since `begin` visible to other readers
    pub fn commit(&mut self) -> MetadataResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Discard all rows written since `begin`
    pub fn rollback(&mut self) -> MetadataResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    pub fn insert_file(&self, file: &FileRecord) -> MetadataResult<()> {
        self.conn.execute(
            "INSERT INTO files (file_id, filename, account_id, group_id, shard_count,
                                required_shards, key_threshold, original_length, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                file.file_id.to_string(),
                file.filename,
                file.account_id,
                file.group_id,
                file.shard_count,
                file.required_shards,
                file.key_threshold,
                file.original_length,
                file.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_fragment(
        &self,
        file_id: Uuid,
        shard_index: u32,
        storage_id: i64,
        shard_file_id: &str,
        folder_id: &str,
        shard_size: u64,
    ) -> MetadataResult<i64> {
        self.conn.execute(
            "INSERT INTO file_shards (file_id, shard_index, storage_id, shard_file_id,
                                      folder_id, shard_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                file_id.to_string(),
                shard_index,
                storage_id,
                shard_file_id,
                folder_id,
                shard_size,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_key_share(
        &self,
        file_id: Uuid,
        storage_id: i64,
        key_file_id: &str,
    ) -> MetadataResult<i64> {
        self.conn.execute(
            "INSERT INTO file_keys (file_id, storage_id, key_file_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                file_id.to_string(),
                storage_id,
                key_file_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn file(&self, file_id: Uuid) -> MetadataResult<Option<FileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_id, filename, account_id, group_id, shard_count, required_shards,
                    key_threshold, original_length, created_at
             FROM files WHERE file_id = ?1",
        )?;

        let file = stmt
            .query_row(params![file_id.to_string()], row_to_file)
            .optional()?;
        Ok(file)
    }

    /// Fragment rows for a file, in shard index order
    pub fn fragments(&self, file_id: Uuid) -> MetadataResult<Vec<FragmentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT shard_id, file_id, shard_index, storage_id, shard_file_id, folder_id, shard_size
             FROM file_shards WHERE file_id = ?1 ORDER BY shard_index",
        )?;

        let rows = stmt.query_map(params![file_id.to_string()], row_to_fragment)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Key share rows for a file, in insertion order
    pub fn key_shares(&self, file_id: Uuid) -> MetadataResult<Vec<KeyShareRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT key_id, file_id, storage_id, key_file_id
             FROM file_keys WHERE file_id = ?1 ORDER BY key_id",
        )?;

        let rows = stmt.query_map(params![file_id.to_string()], row_to_key_share)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Register a connected storage account and return its id.
    /// The token is stored opaquely; refreshing it is the account layer's job.
    pub fn register_storage(
        &self,
        kind: StorageKind,
        access_token: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> MetadataResult<i64> {
        self.conn.execute(
            "INSERT INTO storage (storage_type, access_token, name, email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![kind.as_str(), access_token, name, email, Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Row counts across the store
    pub fn stats(&self) -> MetadataResult<MetadataStats> {
        let mut stmt = self.conn.prepare(
            "SELECT (SELECT COUNT(*) FROM files),
                    (SELECT COUNT(*) FROM file_shards),
                    (SELECT COUNT(*) FROM file_keys)",
        )?;

        let stats = stmt.query_row([], |row| {
            Ok(MetadataStats {
                files: row.get(0)?,
                fragments: row.get(1)?,
                key_shares: row.get(2)?,
            })
        })?;
        Ok(stats)
    }

    /// Resolve a storage id to a read-only handle
    pub fn storage_handle(&self, storage_id: i64) -> MetadataResult<StorageHandle> {
        let mut stmt = self.conn.prepare(
            "SELECT storage_id, storage_type, access_token, name, email
             FROM storage WHERE storage_id = ?1",
        )?;

        let handle = stmt
            .query_row(params![storage_id], |row| {
                let kind_str: String = row.get(1)?;
                Ok((kind_str, row.get::<_, String>(2)?, row.get::<_, Option<String>>(3)?, row.get::<_, Option<String>>(4)?))
            })
            .optional()?;

        let (kind_str, access_token, name, email) =
            handle.ok_or(MetadataError::UnknownStorage(storage_id))?;
        let kind = StorageKind::parse(&kind_str)
            .ok_or_else(|| MetadataError::Corrupt(format!("unknown storage type '{kind_str}'")))?;

        Ok(StorageHandle {
            storage_id,
            kind,
            access_token,
            name,
            email,
        })
    }
}

fn row_to_file(row: &Row) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        file_id: parse_uuid(row, 0)?,
        filename: row.get(1)?,
        account_id: row.get(2)?,
        group_id: row.get(3)?,
        shard_count: row.get(4)?,
        required_shards: row.get(5)?,
        key_threshold: row.get(6)?,
        original_length: row.get(7)?,
        created_at: parse_timestamp(row, 8)?,
    })
}

fn row_to_fragment(row: &Row) -> rusqlite::Result<FragmentRecord> {
    Ok(FragmentRecord {
        shard_id: row.get(0)?,
        file_id: parse_uuid(row, 1)?,
        shard_index: row.get(2)?,
        storage_id: row.get(3)?,
        shard_file_id: row.get(4)?,
        folder_id: row.get(5)?,
        shard_size: row.get(6)?,
    })
}

fn row_to_key_share(row: &Row) -> rusqlite::Result<KeyShareRecord> {
    Ok(KeyShareRecord {
        key_id: row.get(0)?,
        file_id: parse_uuid(row, 1)?,
        storage_id: row.get(2)?,
        key_file_id: row.get(3)?,
    })
}

fn parse_uuid(row: &Row, index: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(index)?;
    Uuid::parse_str(&raw).map_err(|_| {
        rusqlite::Error::InvalidColumnType(index, "file_id".to_string(), rusqlite::types::Type::Text)
    })
}

fn parse_timestamp(row: &Row, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                index,
                "created_at".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}
