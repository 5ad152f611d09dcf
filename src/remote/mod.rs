//! Remote Blob Stores - uniform put/get over external storage providers
//!
//! Fragments and key shares land in per-account cloud drives. Each provider
//! implements the `BlobStore` trait; the router dispatches on the provider
//! kind recorded in the owning storage handle. Retry policy belongs to the
//! callers, not to the adapters.

mod dropbox;
mod google_drive;
mod memory;

pub use dropbox::DropboxStore;
pub use google_drive::GoogleDriveStore;
pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Storage type {0} is not supported")]
    Unsupported(StorageKind),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote blob not found: {0}")]
    NotFound(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Provider backing a storage handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    GoogleDrive,
    Dropbox,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::GoogleDrive => "google_drive",
            StorageKind::Dropbox => "dropbox",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "google_drive" => Some(StorageKind::GoogleDrive),
            "dropbox" => Some(StorageKind::Dropbox),
            _ => None,
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a single fragment or key share should land
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub storage_id: i64,
    pub folder_id: String,
    #[serde(rename = "type")]
    pub kind: StorageKind,
}

/// Read-only view of a connected storage account.
///
/// The token is opaque to the pipelines; acquisition and refresh happen in
/// the account layer before a handle is issued.
#[derive(Debug, Clone)]
pub struct StorageHandle {
    pub storage_id: i64,
    pub kind: StorageKind,
    pub access_token: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Uniform put/get over heterogeneous blob stores.
///
/// `put` returns the provider-assigned blob id; the suggested name is
/// advisory and the id is the only authoritative reference.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `payload` into the destination folder under an advisory name
    async fn put(
        &self,
        handle: &StorageHandle,
        folder_id: &str,
        name: &str,
        payload: &[u8],
    ) -> RemoteResult<String>;

    /// Download the full blob
    async fn get(&self, handle: &StorageHandle, blob_id: &str) -> RemoteResult<Vec<u8>>;
}

/// Dispatches blob operations to the provider named by the handle
pub struct RemoteRouter {
    google_drive: GoogleDriveStore,
    dropbox: DropboxStore,
}

impl RemoteRouter {
    pub fn new(timeout: Duration) -> RemoteResult<Self> {
        Ok(Self {
            google_drive: GoogleDriveStore::new(timeout)?,
            dropbox: DropboxStore,
        })
    }
}

#[async_trait]
impl BlobStore for RemoteRouter {
    async fn put(
        &self,
        handle: &StorageHandle,
        folder_id: &str,
        name: &str,
        payload: &[u8],
    ) -> RemoteResult<String> {
        match handle.kind {
            StorageKind::GoogleDrive => self.google_drive.put(handle, folder_id, name, payload).await,
            StorageKind::Dropbox => self.dropbox.put(handle, folder_id, name, payload).await,
        }
    }

    async fn get(&self, handle: &StorageHandle, blob_id: &str) -> RemoteResult<Vec<u8>> {
        match handle.kind {
            StorageKind::GoogleDrive => self.google_drive.get(handle, blob_id).await,
            StorageKind::Dropbox => self.dropbox.get(handle, blob_id).await,
        }
    }
}
