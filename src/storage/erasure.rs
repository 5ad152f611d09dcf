//! Erasure Coding using Reed-Solomon
//!
//! Splits a buffer into N equal-length fragments of which any K reconstruct
//! the original. Encoding is systematic: fragments 0..K carry the data,
//! K..N carry parity.

use super::StorageError;
use reed_solomon_erasure::galois_8::ReedSolomon;

/// Most fragments the galois_8 field supports per file
pub const MAX_SHARDS: usize = 255;

/// Fragment counts for one file, chosen per upload request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErasureConfig {
    data_shards: usize,
    parity_shards: usize,
}

impl ErasureConfig {
    /// Build from the request-level (required K, total N) pair
    pub fn from_counts(required_shards: usize, shard_count: usize) -> Result<Self, StorageError> {
        if required_shards == 0 || required_shards > shard_count {
            return Err(StorageError::ErasureCoding(format!(
                "invalid fragment counts: {required_shards} of {shard_count}"
            )));
        }
        if shard_count > MAX_SHARDS {
            return Err(StorageError::ErasureCoding(format!(
                "at most {MAX_SHARDS} fragments are supported, got {shard_count}"
            )));
        }

        Ok(Self {
            data_shards: required_shards,
            parity_shards: shard_count - required_shards,
        })
    }

    /// Fragments needed to reconstruct (K)
    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    /// Redundant fragments (N - K)
    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    /// Total number of fragments (N)
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Fragment length for a given buffer length
    pub fn fragment_len(&self, data_len: usize) -> usize {
        (data_len + self.data_shards - 1) / self.data_shards
    }

    fn reed_solomon(&self) -> Result<Option<ReedSolomon>, StorageError> {
        // With no parity requested the coder degrades to pure striping;
        // the RS library rejects zero parity shards.
        if self.parity_shards == 0 {
            return Ok(None);
        }
        ReedSolomon::new(self.data_shards, self.parity_shards)
            .map(Some)
            .map_err(|e| StorageError::ErasureCoding(e.to_string()))
    }
}

/// Erasure encoder - splits a buffer into fragments with parity
pub struct ErasureEncoder {
    config: ErasureConfig,
    rs: Option<ReedSolomon>,
}

impl ErasureEncoder {
    pub fn new(config: ErasureConfig) -> Result<Self, StorageError> {
        Ok(Self {
            rs: config.reed_solomon()?,
            config,
        })
    }

    /// Encode a buffer into total_shards equal-length fragments
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
        if data.is_empty() {
            return Err(StorageError::ErasureCoding("cannot encode an empty buffer".into()));
        }

        let fragment_len = self.config.fragment_len(data.len());

        // Data fragments, zero-padded to the common length
        let mut shards: Vec<Vec<u8>> = Vec::with_capacity(self.config.total_shards());
        for i in 0..self.config.data_shards {
            let start = i * fragment_len;
            let end = (start + fragment_len).min(data.len());

            let mut shard = if start < data.len() {
                data[start..end].to_vec()
            } else {
                vec![]
            };
            shard.resize(fragment_len, 0);
            shards.push(shard);
        }

        for _ in 0..self.config.parity_shards {
            shards.push(vec![0u8; fragment_len]);
        }

        if let Some(rs) = &self.rs {
            let mut shard_refs: Vec<&mut [u8]> =
                shards.iter_mut().map(|s| s.as_mut_slice()).collect();
            rs.encode(&mut shard_refs)
                .map_err(|e| StorageError::ErasureCoding(e.to_string()))?;
        }

        Ok(shards)
    }

    pub fn config(&self) -> ErasureConfig {
        self.config
    }
}

/// Erasure decoder - reconstructs the data region from surviving fragments
pub struct ErasureDecoder {
    config: ErasureConfig,
    rs: Option<ReedSolomon>,
}

impl ErasureDecoder {
    pub fn new(config: ErasureConfig) -> Result<Self, StorageError> {
        Ok(Self {
            rs: config.reed_solomon()?,
            config,
        })
    }

    /// Decode from fragments placed at their original indices; missing ones
    /// are passed as None. Returns the concatenated data region
    /// (data_shards * fragment_len bytes); callers trim with their own
    /// length information.
    pub fn decode(&self, mut shards: Vec<Option<Vec<u8>>>) -> Result<Vec<u8>, StorageError> {
        if shards.len() != self.config.total_shards() {
            return Err(StorageError::ErasureCoding(format!(
                "expected {} fragment slots, got {}",
                self.config.total_shards(),
                shards.len()
            )));
        }

        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < self.config.data_shards {
            return Err(StorageError::FragmentShortfall {
                have: available,
                need: self.config.data_shards,
            });
        }

        // All supplied fragments must share one length
        let mut lengths = shards.iter().flatten().map(|s| s.len());
        let fragment_len = lengths.next().unwrap_or(0);
        if lengths.any(|len| len != fragment_len) {
            return Err(StorageError::ErasureCoding(
                "fragments must all be the same length".into(),
            ));
        }

        if let Some(rs) = &self.rs {
            rs.reconstruct(&mut shards)
                .map_err(|e| StorageError::ErasureCoding(e.to_string()))?;
        }

        let mut data = Vec::with_capacity(self.config.data_shards * fragment_len);
        for slot in shards.iter().take(self.config.data_shards) {
            match slot {
                Some(shard) => data.extend_from_slice(shard),
                None => {
                    return Err(StorageError::ErasureCoding(
                        "data fragment missing after reconstruction".into(),
                    ))
                }
            }
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn coders(k: usize, n: usize) -> (ErasureEncoder, ErasureDecoder) {
        let config = ErasureConfig::from_counts(k, n).unwrap();
        (
            ErasureEncoder::new(config).unwrap(),
            ErasureDecoder::new(config).unwrap(),
        )
    }

    #[test]
    fn test_config_counts() {
        let config = ErasureConfig::from_counts(4, 6).unwrap();
        assert_eq!(config.data_shards(), 4);
        assert_eq!(config.parity_shards(), 2);
        assert_eq!(config.total_shards(), 6);
        assert_eq!(config.fragment_len(10), 3);

        assert!(ErasureConfig::from_counts(0, 4).is_err());
        assert!(ErasureConfig::from_counts(5, 4).is_err());
        assert!(ErasureConfig::from_counts(2, 300).is_err());
    }

    #[test]
    fn test_encode_decode_no_loss() {
        let (encoder, decoder) = coders(4, 6);
        let original = b"Any two of these six fragments can go missing.".to_vec();

        let shards = encoder.encode(&original).unwrap();
        assert_eq!(shards.len(), 6);
        let fragment_len = shards[0].len();
        assert!(shards.iter().all(|s| s.len() == fragment_len));

        let slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        let decoded = decoder.decode(slots).unwrap();

        assert_eq!(&decoded[..original.len()], &original[..]);
    }

    #[test]
    fn test_decode_with_maximum_loss() {
        let (encoder, decoder) = coders(4, 6);
        let original: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();

        let shards = encoder.encode(&original).unwrap();
        let mut slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        slots[1] = None;
        slots[4] = None;

        let decoded = decoder.decode(slots).unwrap();
        assert_eq!(&decoded[..original.len()], &original[..]);
    }

    #[test]
    fn test_too_many_losses() {
        let (encoder, decoder) = coders(4, 6);
        let shards = encoder.encode(b"not enough survivors").unwrap();

        let mut slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        slots[0] = None;
        slots[2] = None;
        slots[5] = None;

        let result = decoder.decode(slots);
        assert!(matches!(
            result,
            Err(StorageError::FragmentShortfall { have: 3, need: 4 })
        ));
    }

    #[test]
    fn test_striping_when_no_parity() {
        // K == N: no parity fragments, plain striping
        let (encoder, decoder) = coders(4, 4);
        let original = b"all four fragments are data".to_vec();

        let shards = encoder.encode(&original).unwrap();
        assert_eq!(shards.len(), 4);

        let slots: Vec<Option<Vec<u8>>> = shards.clone().into_iter().map(Some).collect();
        let decoded = decoder.decode(slots).unwrap();
        assert_eq!(&decoded[..original.len()], &original[..]);

        // Striping has no redundancy: any loss is fatal
        let mut slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        slots[2] = None;
        assert!(matches!(
            decoder.decode(slots),
            Err(StorageError::FragmentShortfall { have: 3, need: 4 })
        ));
    }

    #[test]
    fn test_unequal_fragments_rejected() {
        let (encoder, decoder) = coders(2, 3);
        let shards = encoder.encode(b"equal lengths required").unwrap();

        let mut slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        if let Some(shard) = slots[1].as_mut() {
            shard.push(0);
        }

        assert!(matches!(
            decoder.decode(slots),
            Err(StorageError::ErasureCoding(_))
        ));
    }

    #[test]
    fn test_empty_buffer_rejected() {
        let (encoder, _) = coders(2, 4);
        assert!(encoder.encode(b"").is_err());
    }

    #[test]
    fn test_large_data() {
        let (encoder, decoder) = coders(10, 14);
        let original: Vec<u8> = (0..1_000_000).map(|i| (i % 256) as u8).collect();

        let shards = encoder.encode(&original).unwrap();
        let mut slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        slots[0] = None;
        slots[5] = None;
        slots[10] = None;
        slots[13] = None;

        let decoded = decoder.decode(slots).unwrap();
        assert_eq!(&decoded[..original.len()], &original[..]);
    }

    proptest! {
        #[test]
        fn prop_any_k_fragments_reconstruct(
            data in proptest::collection::vec(any::<u8>(), 1..2048),
            k in 1usize..=5,
            parity in 0usize..=3,
            seed in any::<u64>(),
        ) {
            let n = k + parity;
            let (encoder, decoder) = coders(k, n);
            let shards = encoder.encode(&data).unwrap();

            // Keep a pseudo-random subset of exactly k fragments
            let mut keep: Vec<usize> = (0..n).collect();
            let mut state = seed;
            while keep.len() > k {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let drop = (state >> 33) as usize % keep.len();
                keep.swap_remove(drop);
            }

            let mut slots: Vec<Option<Vec<u8>>> = vec![None; n];
            for index in keep {
                slots[index] = Some(shards[index].clone());
            }

            let decoded = decoder.decode(slots).unwrap();
            prop_assert_eq!(&decoded[..data.len()], &data[..]);
        }
    }
}
