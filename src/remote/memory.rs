//! In-memory blob store for tests and local development
//!
//! Keeps every blob in a process-local map and hands out opaque ids, so the
//! pipelines can run without a provider account. `remove` and `replace`
//! simulate blob loss and corruption.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BlobStore, RemoteError, RemoteResult, StorageHandle};

#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    counter: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a blob, as if the remote object had been deleted
    pub fn remove(&self, blob_id: &str) -> bool {
        self.blobs.lock().remove(blob_id).is_some()
    }

    /// Overwrite a blob in place, as if the remote object had been tampered with
    pub fn replace(&self, blob_id: &str, payload: Vec<u8>) -> bool {
        let mut blobs = self.blobs.lock();
        match blobs.get_mut(blob_id) {
            Some(existing) => {
                *existing = payload;
                true
            }
            None => false,
        }
    }

    /// Peek at a stored blob without going through the trait
    pub fn raw(&self, blob_id: &str) -> Option<Vec<u8>> {
        self.blobs.lock().get(blob_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(
        &self,
        _handle: &StorageHandle,
        _folder_id: &str,
        _name: &str,
        payload: &[u8],
    ) -> RemoteResult<String> {
        let serial = self.counter.fetch_add(1, Ordering::Relaxed);
        let blob_id = format!("mem-{serial}");
        self.blobs.lock().insert(blob_id.clone(), payload.to_vec());
        Ok(blob_id)
    }

    async fn get(&self, _handle: &StorageHandle, blob_id: &str) -> RemoteResult<Vec<u8>> {
        self.blobs
            .lock()
            .get(blob_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(blob_id.to_string()))
    }
}
