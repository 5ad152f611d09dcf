//! Dropbox backend - not wired up yet
//!
//! The variant exists in the data model so accounts can already be
//! registered; both operations report the kind as unsupported.

use async_trait::async_trait;

use super::{BlobStore, RemoteError, RemoteResult, StorageHandle, StorageKind};

pub struct DropboxStore;

#[async_trait]
impl BlobStore for DropboxStore {
    async fn put(
        &self,
        _handle: &StorageHandle,
        _folder_id: &str,
        _name: &str,
        _payload: &[u8],
    ) -> RemoteResult<String> {
        Err(RemoteError::Unsupported(StorageKind::Dropbox))
    }

    async fn get(&self, _handle: &StorageHandle, _blob_id: &str) -> RemoteResult<Vec<u8>> {
        Err(RemoteError::Unsupported(StorageKind::Dropbox))
    }
}
