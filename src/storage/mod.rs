//! Storage Module - the split-file upload and download pipelines
//!
//! Composes AEAD encryption, erasure coding and threshold key sharing, and
//! records every placement in the metadata store.

mod erasure;
mod pipeline;

pub use erasure::{ErasureConfig, ErasureDecoder, ErasureEncoder, MAX_SHARDS};
pub use pipeline::{
    DownloadedFile, FileManager, KeySharePlacement, ShardPlacement, UploadReceipt, UploadRequest,
};

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::metadata::MetadataError;
use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Erasure coding error: {0}")]
    ErasureCoding(String),

    #[error("Not enough fragments available: have {have}, need {need}")]
    FragmentShortfall { have: usize, need: usize },

    #[error("Not enough key shares available: have {have}, need {need}")]
    KeyShareShortfall { have: usize, need: usize },

    #[error("Key reconstruction failed: {0}")]
    KeyReconstructFailed(String),

    #[error("Corrupt file metadata: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
