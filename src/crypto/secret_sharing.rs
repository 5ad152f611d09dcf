//! Threshold key sharing using Shamir's scheme
//!
//! A 32-byte file key is split into M shares of which any T recover it.
//! The underlying field works on 16-byte blocks, so the key is halved and
//! each half is dealt independently; shares carrying the same x coordinate
//! are paired into a single 32-byte combined share.

use super::CryptoError;
use sharks::{Share, Sharks};

/// Bytes in one half of the split key
const HALF_SIZE: usize = 16;
/// Bytes in a combined (paired) share
pub const SHARE_SIZE: usize = 32;
/// Serialized share length: index byte followed by the share body
pub const SHARE_BLOB_SIZE: usize = SHARE_SIZE + 1;

/// One combined share of a split 32-byte key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretShare {
    /// Shamir x coordinate, 1-based
    pub index: u8,
    /// Lower-half share followed by upper-half share
    pub share: [u8; SHARE_SIZE],
}

impl SecretShare {
    /// Serialized form persisted in remote stores: index byte || 32-byte share
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SHARE_BLOB_SIZE);
        out.push(self.index);
        out.extend_from_slice(&self.share);
        out
    }

    /// Parse the serialized form back into a share
    pub fn from_bytes(raw: &[u8]) -> Result<Self, CryptoError> {
        if raw.len() != SHARE_BLOB_SIZE {
            return Err(CryptoError::MalformedShare(format!(
                "expected {} bytes, got {}",
                SHARE_BLOB_SIZE,
                raw.len()
            )));
        }
        if raw[0] == 0 {
            return Err(CryptoError::MalformedShare("share index 0 is not valid".into()));
        }

        let mut share = [0u8; SHARE_SIZE];
        share.copy_from_slice(&raw[1..]);
        Ok(Self { index: raw[0], share })
    }

    fn half(&self, offset: usize) -> Result<Share, CryptoError> {
        let mut raw = Vec::with_capacity(HALF_SIZE + 1);
        raw.push(self.index);
        raw.extend_from_slice(&self.share[offset..offset + HALF_SIZE]);
        Share::try_from(raw.as_slice()).map_err(|e| CryptoError::ShareRecovery(e.to_string()))
    }
}

/// Split a 32-byte key into `share_count` combined shares with recovery
/// threshold `threshold`. Share indices run 1..=share_count; both halves
/// must agree on them or the split is aborted.
pub fn split_key(
    key: &[u8; 32],
    threshold: u8,
    share_count: u8,
) -> Result<Vec<SecretShare>, CryptoError> {
    if threshold == 0 || threshold > share_count {
        return Err(CryptoError::InvalidThreshold { threshold, share_count });
    }

    let sharks = Sharks(threshold);
    let lower: Vec<Share> = sharks.dealer(&key[..HALF_SIZE]).take(share_count as usize).collect();
    let upper: Vec<Share> = sharks.dealer(&key[HALF_SIZE..]).take(share_count as usize).collect();

    let mut shares = Vec::with_capacity(share_count as usize);
    for (lo, hi) in lower.iter().zip(upper.iter()) {
        let lo_bytes = Vec::from(lo);
        let hi_bytes = Vec::from(hi);
        if lo_bytes[0] != hi_bytes[0] {
            return Err(CryptoError::ShareIndexMismatch {
                left: lo_bytes[0],
                right: hi_bytes[0],
            });
        }

        let mut share = [0u8; SHARE_SIZE];
        share[..HALF_SIZE].copy_from_slice(&lo_bytes[1..]);
        share[HALF_SIZE..].copy_from_slice(&hi_bytes[1..]);
        shares.push(SecretShare { index: lo_bytes[0], share });
    }

    Ok(shares)
}

/// Recover the 32-byte key from at least `threshold` combined shares.
/// Only the first `threshold` shares are consumed.
pub fn combine_key(shares: &[SecretShare], threshold: u8) -> Result<[u8; 32], CryptoError> {
    if shares.len() < threshold as usize {
        return Err(CryptoError::InsufficientShares {
            have: shares.len(),
            need: threshold as usize,
        });
    }

    let selected = &shares[..threshold as usize];
    let lower = selected.iter().map(|s| s.half(0)).collect::<Result<Vec<_>, _>>()?;
    let upper = selected
        .iter()
        .map(|s| s.half(HALF_SIZE))
        .collect::<Result<Vec<_>, _>>()?;

    let sharks = Sharks(threshold);
    let lo_half = sharks
        .recover(&lower)
        .map_err(|e| CryptoError::ShareRecovery(e.to_string()))?;
    let hi_half = sharks
        .recover(&upper)
        .map_err(|e| CryptoError::ShareRecovery(e.to_string()))?;
    if lo_half.len() != HALF_SIZE || hi_half.len() != HALF_SIZE {
        return Err(CryptoError::ShareRecovery("recovered halves have unexpected length".into()));
    }

    let mut key = [0u8; 32];
    key[..HALF_SIZE].copy_from_slice(&lo_half);
    key[HALF_SIZE..].copy_from_slice(&hi_half);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(7).wrapping_add(3);
        }
        key
    }

    #[test]
    fn test_split_combine_all_shares() {
        let key = test_key();
        let shares = split_key(&key, 2, 3).unwrap();

        assert_eq!(shares.len(), 3);
        assert_eq!(combine_key(&shares, 2).unwrap(), key);
    }

    #[test]
    fn test_indices_are_one_based_and_sequential() {
        let shares = split_key(&test_key(), 3, 5).unwrap();
        let indices: Vec<u8> = shares.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_any_threshold_subset_recovers() {
        let key = test_key();
        let shares = split_key(&key, 2, 4).unwrap();

        let pairs = [[0, 1], [1, 3], [3, 0], [2, 3]];
        for pair in pairs {
            let subset = vec![shares[pair[0]].clone(), shares[pair[1]].clone()];
            assert_eq!(combine_key(&subset, 2).unwrap(), key);
        }
    }

    #[test]
    fn test_insufficient_shares() {
        let shares = split_key(&test_key(), 3, 4).unwrap();

        let result = combine_key(&shares[..2], 3);
        assert!(matches!(
            result,
            Err(CryptoError::InsufficientShares { have: 2, need: 3 })
        ));
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(matches!(
            split_key(&test_key(), 4, 3),
            Err(CryptoError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            split_key(&test_key(), 0, 3),
            Err(CryptoError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_share_serialization_roundtrip() {
        let shares = split_key(&test_key(), 2, 3).unwrap();

        for share in &shares {
            let raw = share.to_bytes();
            assert_eq!(raw.len(), SHARE_BLOB_SIZE);
            assert_eq!(raw[0], share.index);
            assert_eq!(&SecretShare::from_bytes(&raw).unwrap(), share);
        }
    }

    #[test]
    fn test_malformed_share_rejected() {
        assert!(matches!(
            SecretShare::from_bytes(&[1u8; 32]),
            Err(CryptoError::MalformedShare(_))
        ));
        assert!(matches!(
            SecretShare::from_bytes(&[1u8; 34]),
            Err(CryptoError::MalformedShare(_))
        ));
        assert!(matches!(
            SecretShare::from_bytes(&[0u8; 33]),
            Err(CryptoError::MalformedShare(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_threshold_subset_recovers(
            key in any::<[u8; 32]>(),
            threshold in 1u8..=5,
            extra in 0u8..=3,
            seed in any::<u64>(),
        ) {
            let share_count = threshold + extra;
            let shares = split_key(&key, threshold, share_count).unwrap();

            // Pick a pseudo-random subset of exactly `threshold` shares
            let mut pool: Vec<SecretShare> = shares;
            let mut subset = Vec::with_capacity(threshold as usize);
            let mut state = seed;
            for _ in 0..threshold {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let pick = (state >> 33) as usize % pool.len();
                subset.push(pool.swap_remove(pick));
            }

            prop_assert_eq!(combine_key(&subset, threshold).unwrap(), key);
        }
    }
}
