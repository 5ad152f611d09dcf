//! Cryptography Module - AEAD file encryption and threshold key sharing
//!
//! Provides AES-256-GCM for file contents and Shamir secret sharing for
//! splitting the file key across independent storage accounts.

pub mod aead;
pub mod secret_sharing;

pub use aead::EncryptionKey;
pub use secret_sharing::{combine_key, split_key, SecretShare};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed: ciphertext rejected")]
    AuthFailed,

    #[error("Invalid share threshold: {threshold} of {share_count}")]
    InvalidThreshold { threshold: u8, share_count: u8 },

    #[error("Share index mismatch: {left} != {right}")]
    ShareIndexMismatch { left: u8, right: u8 },

    #[error("Not enough key shares: have {have}, need {need}")]
    InsufficientShares { have: usize, need: usize },

    #[error("Malformed key share: {0}")]
    MalformedShare(String),

    #[error("Share recovery failed: {0}")]
    ShareRecovery(String),
}

/// Secure random bytes generator
pub fn random_bytes(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
