//! File encryption using AES-256-GCM
//!
//! Every upload gets a fresh 256-bit key and a fresh random 96-bit nonce;
//! the nonce travels as a prefix of the encrypted blob.

use super::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;

pub const NONCE_SIZE: usize = 12;
pub const KEY_SIZE: usize = 32;
pub const TAG_SIZE: usize = 16;

/// AES-256-GCM encryption key
#[derive(Clone)]
pub struct EncryptionKey {
    key: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Create an encryption key from raw bytes
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Generate a random encryption key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Encrypt data with AES-256-GCM
    /// Returns: nonce (12 bytes) || ciphertext || tag (16 bytes)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        // Generate random nonce
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        // Prepend nonce to ciphertext
        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(blob)
    }

    /// Decrypt a blob of the form nonce (12 bytes) || ciphertext || tag (16 bytes).
    /// Any tamper, truncation, or wrong key surfaces as `AuthFailed`.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::AuthFailed);
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let nonce = Nonce::from_slice(&blob[..NONCE_SIZE]);
        let ciphertext = &blob[NONCE_SIZE..];

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::AuthFailed)
    }

    /// Get the raw key bytes (be careful with this!)
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = EncryptionKey::generate();
        let plaintext = b"Split me across five clouds.";

        let blob = key.encrypt(plaintext).unwrap();
        let decrypted = key.decrypt(&blob).unwrap();

        assert_eq!(plaintext.to_vec(), decrypted);
    }

    #[test]
    fn test_empty_plaintext() {
        let key = EncryptionKey::generate();

        let blob = key.encrypt(b"").unwrap();
        assert_eq!(blob.len(), NONCE_SIZE + TAG_SIZE);

        let decrypted = key.decrypt(&blob).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_different_keys_fail() {
        let key1 = EncryptionKey::generate();
        let key2 = EncryptionKey::generate();

        let blob = key1.encrypt(b"secret data").unwrap();

        assert!(matches!(key2.decrypt(&blob), Err(CryptoError::AuthFailed)));
    }

    #[test]
    fn test_tamper_detected() {
        let key = EncryptionKey::generate();
        let mut blob = key.encrypt(b"integrity matters").unwrap();

        // Flip one ciphertext bit
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        assert!(matches!(key.decrypt(&blob), Err(CryptoError::AuthFailed)));
    }

    #[test]
    fn test_truncated_blob() {
        let key = EncryptionKey::generate();
        assert!(matches!(key.decrypt(&[0u8; 10]), Err(CryptoError::AuthFailed)));
    }

    #[test]
    fn test_nonce_freshness() {
        let key = EncryptionKey::generate();
        let plaintext = b"same plaintext, different ciphertext";

        let blob1 = key.encrypt(plaintext).unwrap();
        let blob2 = key.encrypt(plaintext).unwrap();

        assert_ne!(blob1, blob2);
        assert_ne!(blob1[..NONCE_SIZE], blob2[..NONCE_SIZE]);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let key = EncryptionKey::generate();
            let blob = key.encrypt(&plaintext).unwrap();
            prop_assert_eq!(key.decrypt(&blob).unwrap(), plaintext);
        }
    }
}
