//! File pipelines - upload and download orchestration
//!
//! Upload: encrypt, erasure-code, push fragments, split the key, push key
//! shares, commit metadata. Download runs the inverse and tolerates losing
//! blobs up to the configured thresholds; redundancy is the retry policy.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ErasureConfig, ErasureDecoder, ErasureEncoder, StorageError, MAX_SHARDS};
use crate::crypto::aead::{EncryptionKey, NONCE_SIZE, TAG_SIZE};
use crate::crypto::secret_sharing::{combine_key, split_key, SecretShare};
use crate::metadata::{FileRecord, MetadataStore};
use crate::remote::{BlobStore, Destination, RemoteRouter, StorageHandle};
use crate::ServiceConfig;

/// Bytes of the big-endian plaintext-length prefix carried inside the
/// erasure-coded buffer
const LENGTH_PREFIX: usize = 4;

/// Everything one upload request carries
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub account_id: i64,
    pub group_id: i64,
    /// Total erasure fragments (N)
    pub shard_count: u32,
    /// Fragments needed to reconstruct (K)
    pub required_shards: u32,
    /// Total key shares (M)
    pub share_count: u32,
    /// Key shares needed to recover the key (T)
    pub key_threshold: u32,
    pub fragment_destinations: Vec<Destination>,
    pub key_destinations: Vec<Destination>,
}

impl UploadRequest {
    fn validate(&self) -> Result<(), StorageError> {
        if self.required_shards == 0 || self.required_shards > self.shard_count {
            return Err(StorageError::InvalidConfig(format!(
                "required_shards must be within 1..={}, got {}",
                self.shard_count, self.required_shards
            )));
        }
        if self.shard_count as usize > MAX_SHARDS {
            return Err(StorageError::InvalidConfig(format!(
                "shard_count must be at most {MAX_SHARDS}, got {}",
                self.shard_count
            )));
        }
        if self.key_threshold == 0 || self.key_threshold > self.share_count {
            return Err(StorageError::InvalidConfig(format!(
                "key_threshold must be within 1..={}, got {}",
                self.share_count, self.key_threshold
            )));
        }
        if self.share_count > u8::MAX as u32 {
            return Err(StorageError::InvalidConfig(format!(
                "share_count must be at most {}, got {}",
                u8::MAX,
                self.share_count
            )));
        }
        if self.fragment_destinations.len() != self.shard_count as usize {
            return Err(StorageError::InvalidConfig(format!(
                "fragment_destinations length must be {}, got {}",
                self.shard_count,
                self.fragment_destinations.len()
            )));
        }
        if self.key_destinations.len() != self.share_count as usize {
            return Err(StorageError::InvalidConfig(format!(
                "key_destinations length must be {}, got {}",
                self.share_count,
                self.key_destinations.len()
            )));
        }
        Ok(())
    }
}

/// Where one fragment ended up
#[derive(Debug, Clone, Serialize)]
pub struct ShardPlacement {
    pub index: u32,
    pub shard_file_id: String,
    pub folder_id: String,
    pub storage_id: i64,
}

/// Where one key share ended up
#[derive(Debug, Clone, Serialize)]
pub struct KeySharePlacement {
    pub share_index: u8,
    pub key_file_id: String,
    pub storage_id: i64,
}

/// Result of a committed upload
#[derive(Debug, Serialize)]
pub struct UploadReceipt {
    pub file_id: Uuid,
    pub shards: Vec<ShardPlacement>,
    pub key_shares: Vec<KeySharePlacement>,
}

/// Result of a download
#[derive(Debug)]
pub struct DownloadedFile {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Orchestrates the split-file upload and download pipelines
pub struct FileManager {
    metadata: MetadataStore,
    remote: Arc<dyn BlobStore>,
}

impl FileManager {
    pub fn new(metadata: MetadataStore, remote: Arc<dyn BlobStore>) -> Self {
        Self { metadata, remote }
    }

    /// Wire a manager from service configuration: metadata store on disk,
    /// provider-backed remote router
    pub fn open(config: &ServiceConfig) -> Result<Self, StorageError> {
        let metadata = MetadataStore::open(&config.database_path)?;
        let remote = RemoteRouter::new(config.remote_timeout())?;
        Ok(Self::new(metadata, Arc::new(remote)))
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Encrypt, split, and distribute a file. All metadata rows land in one
    /// transaction; any failure rolls the transaction back and surfaces the
    /// error. Remote blobs placed before the failure are left behind as
    /// orphans.
    pub async fn upload(
        &mut self,
        content: &[u8],
        request: &UploadRequest,
    ) -> Result<UploadReceipt, StorageError> {
        request.validate()?;

        self.metadata.begin()?;
        match self.run_upload(content, request).await {
            Ok(receipt) => {
                self.metadata.commit()?;
                info!(
                    file_id = %receipt.file_id,
                    shards = receipt.shards.len(),
                    key_shares = receipt.key_shares.len(),
                    "upload committed"
                );
                Ok(receipt)
            }
            Err(err) => {
                warn!(error = %err, "upload failed, rolling back; placed blobs become orphans");
                if let Err(rollback_err) = self.metadata.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn run_upload(
        &self,
        content: &[u8],
        request: &UploadRequest,
    ) -> Result<UploadReceipt, StorageError> {
        let key = EncryptionKey::generate();
        let encrypted = key.encrypt(content)?;

        // The length prefix is what lets the download trim erasure padding
        let mut buffer = Vec::with_capacity(LENGTH_PREFIX + encrypted.len());
        buffer.extend_from_slice(&(content.len() as u32).to_be_bytes());
        buffer.extend_from_slice(&encrypted);

        let file = FileRecord::new(
            &request.filename,
            request.account_id,
            request.group_id,
            request.shard_count,
            request.required_shards,
            request.key_threshold,
            content.len() as u64,
        );
        self.metadata.insert_file(&file)?;
        debug!(file_id = %file.file_id, "file row flushed");

        let config = ErasureConfig::from_counts(
            request.required_shards as usize,
            request.shard_count as usize,
        )?;
        let fragments = ErasureEncoder::new(config)?.encode(&buffer)?;

        let mut shards = Vec::with_capacity(fragments.len());
        for (index, fragment) in fragments.iter().enumerate() {
            let dest = &request.fragment_destinations[index];
            let handle = self
                .destination_handle(dest)
                .map_err(|e| StorageError::UploadFailed(format!("shard {index}: {e}")))?;
            let name = format!("{}.shard{}", request.filename, index);

            let blob_id = self
                .remote
                .put(&handle, &dest.folder_id, &name, fragment)
                .await
                .map_err(|e| StorageError::UploadFailed(format!("shard {index}: {e}")))?;

            self.metadata
                .insert_fragment(
                    file.file_id,
                    index as u32,
                    dest.storage_id,
                    &blob_id,
                    &dest.folder_id,
                    fragment.len() as u64,
                )
                .map_err(|e| StorageError::UploadFailed(format!("shard {index}: {e}")))?;
            shards.push(ShardPlacement {
                index: index as u32,
                shard_file_id: blob_id,
                folder_id: dest.folder_id.clone(),
                storage_id: dest.storage_id,
            });
        }

        let share_list = split_key(
            key.as_bytes(),
            request.key_threshold as u8,
            request.share_count as u8,
        )?;

        let mut key_shares = Vec::with_capacity(share_list.len());
        for (slot, share) in share_list.iter().enumerate() {
            let dest = &request.key_destinations[slot];
            let handle = self
                .destination_handle(dest)
                .map_err(|e| StorageError::UploadFailed(format!("key share {slot}: {e}")))?;
            let name = format!("{}.key{}", request.filename, slot);

            let blob_id = self
                .remote
                .put(&handle, &dest.folder_id, &name, &share.to_bytes())
                .await
                .map_err(|e| StorageError::UploadFailed(format!("key share {slot}: {e}")))?;

            self.metadata
                .insert_key_share(file.file_id, dest.storage_id, &blob_id)
                .map_err(|e| StorageError::UploadFailed(format!("key share {slot}: {e}")))?;
            key_shares.push(KeySharePlacement {
                share_index: share.index,
                key_file_id: blob_id,
                storage_id: dest.storage_id,
            });
        }

        Ok(UploadReceipt {
            file_id: file.file_id,
            shards,
            key_shares,
        })
    }

    /// Gather enough key shares and fragments, reconstruct, decrypt.
    /// Individual blob failures are skipped until a threshold becomes
    /// unreachable.
    pub async fn download(&self, file_id: Uuid) -> Result<DownloadedFile, StorageError> {
        let file = self
            .metadata
            .file(file_id)?
            .ok_or_else(|| StorageError::FileNotFound(file_id.to_string()))?;

        let fragment_rows = self.metadata.fragments(file_id)?;
        if fragment_rows.is_empty() {
            return Err(StorageError::Corrupt("no fragment rows recorded".into()));
        }
        let key_rows = self.metadata.key_shares(file_id)?;
        if key_rows.is_empty() {
            return Err(StorageError::Corrupt("no key share rows recorded".into()));
        }

        let required = file.required_shards as usize;
        let total = file.shard_count as usize;
        let threshold = file.key_threshold as usize;
        if key_rows.len() < threshold {
            return Err(StorageError::Corrupt(format!(
                "only {} key share rows recorded, threshold is {}",
                key_rows.len(),
                threshold
            )));
        }

        // Key shares first: any T of them recover the key
        let mut shares: Vec<SecretShare> = Vec::with_capacity(threshold);
        for row in &key_rows {
            if shares.len() >= threshold {
                break;
            }
            let handle = match self.metadata.storage_handle(row.storage_id) {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(key_id = row.key_id, error = %err, "skipping key share: no storage handle");
                    continue;
                }
            };
            let raw = match self.remote.get(&handle, &row.key_file_id).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(key_id = row.key_id, error = %err, "failed to fetch key share");
                    continue;
                }
            };
            match SecretShare::from_bytes(&raw) {
                Ok(share) => shares.push(share),
                Err(err) => warn!(key_id = row.key_id, error = %err, "failed to parse key share"),
            }
        }
        if shares.len() < threshold {
            return Err(StorageError::KeyShareShortfall {
                have: shares.len(),
                need: threshold,
            });
        }

        let key_bytes = combine_key(&shares, threshold as u8)
            .map_err(|e| StorageError::KeyReconstructFailed(e.to_string()))?;
        let key = EncryptionKey::new(key_bytes);
        debug!(file_id = %file_id, "file key reconstructed");

        // Fragments next: the first K fetchable, in shard index order
        let mut fetched: Vec<(usize, Vec<u8>)> = Vec::with_capacity(required);
        for row in &fragment_rows {
            if fetched.len() >= required {
                break;
            }
            let handle = match self.metadata.storage_handle(row.storage_id) {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(shard_index = row.shard_index, error = %err, "skipping fragment: no storage handle");
                    continue;
                }
            };
            match self.remote.get(&handle, &row.shard_file_id).await {
                Ok(data) => fetched.push((row.shard_index as usize, data)),
                Err(err) => {
                    warn!(shard_index = row.shard_index, error = %err, "failed to fetch fragment")
                }
            }
        }
        if fetched.len() < required {
            return Err(StorageError::FragmentShortfall {
                have: fetched.len(),
                need: required,
            });
        }

        // Normalize to a common length before decoding
        let fragment_len = fetched.iter().map(|(_, data)| data.len()).max().unwrap_or(0);
        let mut slots: Vec<Option<Vec<u8>>> = vec![None; total];
        for (index, mut data) in fetched {
            if index >= total {
                return Err(StorageError::Corrupt(format!(
                    "shard index {index} out of range for {total} fragments"
                )));
            }
            data.resize(fragment_len, 0);
            slots[index] = Some(data);
        }

        let config = ErasureConfig::from_counts(required, total)?;
        let buffer = ErasureDecoder::new(config)?.decode(slots)?;

        // Framing: length prefix, nonce, ciphertext-with-tag, erasure padding
        if buffer.len() < LENGTH_PREFIX + NONCE_SIZE + TAG_SIZE {
            return Err(StorageError::Corrupt("reconstructed data incomplete".into()));
        }
        let stated_length =
            u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
        let body = &buffer[LENGTH_PREFIX..];
        let ciphertext_end = NONCE_SIZE + stated_length + TAG_SIZE;
        if body.len() < ciphertext_end {
            return Err(StorageError::Corrupt("reconstructed data incomplete".into()));
        }

        let mut content = key.decrypt(&body[..ciphertext_end])?;

        // The stored plaintext length is authoritative
        content.truncate(file.original_length as usize);
        info!(file_id = %file_id, bytes = content.len(), "download complete");

        Ok(DownloadedFile {
            filename: file.filename,
            content,
        })
    }

    fn destination_handle(&self, dest: &Destination) -> Result<StorageHandle, StorageError> {
        let handle = self.metadata.storage_handle(dest.storage_id)?;
        if handle.kind != dest.kind {
            return Err(StorageError::InvalidConfig(format!(
                "destination type {} does not match storage {} ({})",
                dest.kind, dest.storage_id, handle.kind
            )));
        }
        Ok(handle)
    }
}
