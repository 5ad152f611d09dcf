//! ShardVault Core - Multi-cloud cryptographically-split file storage
//!
//! Each upload is encrypted with a fresh AES-256-GCM key, erasure-coded
//! into N fragments of which any K reconstruct the ciphertext, and the key
//! is split into M Shamir shares of which any T recover it. Fragments and
//! shares spread across independent cloud storage accounts; a relational
//! metadata store records the placements transactionally. An adversary
//! holding fewer than T share locations learns nothing, and the file
//! survives the loss of up to N-K fragment locations.

pub mod crypto;
pub mod logging;
pub mod metadata;
pub mod remote;
pub mod storage;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for ShardVault operations
#[derive(Error, Debug)]
pub enum ShardVaultError {
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] metadata::MetadataError),

    #[error("Remote storage error: {0}")]
    Remote(#[from] remote::RemoteError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShardVaultError {
    /// HTTP-style status the API layer reports for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShardVaultError::Storage(err) => storage_status(err),
            ShardVaultError::Remote(err) => remote_status(err),
            ShardVaultError::Metadata(metadata::MetadataError::UnknownStorage(_)) => 404,
            _ => 500,
        }
    }
}

fn storage_status(err: &storage::StorageError) -> u16 {
    match err {
        storage::StorageError::InvalidConfig(_) => 400,
        storage::StorageError::FileNotFound(_) => 404,
        storage::StorageError::Remote(inner) => remote_status(inner),
        _ => 500,
    }
}

fn remote_status(err: &remote::RemoteError) -> u16 {
    match err {
        remote::RemoteError::Unsupported(_) => 400,
        remote::RemoteError::NotFound(_) => 404,
        remote::RemoteError::Unavailable(_) => 500,
    }
}

pub type Result<T> = std::result::Result<T, ShardVaultError>;

/// Service configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServiceConfig {
    /// Path of the metadata database
    pub database_path: PathBuf,

    /// Per-remote-call timeout in seconds
    pub remote_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./shardvault_data/metadata.db"),
            remote_timeout_secs: 30,
        }
    }
}

pub use remote::{Destination, StorageKind};
pub use storage::{DownloadedFile, FileManager, UploadReceipt, UploadRequest};
