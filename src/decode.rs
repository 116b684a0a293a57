use crate::filter::{BUCKET_SIZE, BYTES_PER_BUCKET, Bucket, Filter};
use crate::rollout::{ROLLOUT_ENTRY_SIZE, RolloutTable};
use std::hash::Hasher;
use std::marker::PhantomData;

/// Error type for decoding a snapshot into a [`Filter`]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Bucket table length is not a multiple of the slots per bucket
    #[error("filter bytes must be a multiple of 4, got {0} bytes")]
    MalformedLength(usize),
    /// Bucket table is present but shorter than a single bucket
    #[error("filter bytes can not be smaller than a bucket (8 bytes), got {0} bytes")]
    TooSmall(usize),
    /// Number of buckets is not a power of two
    #[error("bucket count must be a power of 2, got {0}")]
    NotPowerOfTwo(usize),
    /// Rollout data is not made of whole 8-byte entries
    #[error("rollout bytes must be a multiple of 8, got {0} bytes")]
    MalformedRolloutLength(usize),
}

impl<H: Hasher + Default> Filter<H> {
    /// Decode a filter from the raw snapshot tables.
    ///
    /// `filter` holds the bucket table as little-endian `u16` fingerprints,
    /// four per bucket, with a power-of-two bucket count. `rollout` holds
    /// little-endian `u64` entries packing a 56-bit feature hash prefix over an
    /// 8-bit percentage. Absent or empty inputs mean "no data" for that table.
    ///
    /// Validation happens in order: length divisibility, minimum size, then
    /// power-of-two bucket count, then rollout length. Bytes past the last
    /// whole bucket are ignored.
    ///
    /// Either returns a complete filter or an error, never a partial one.
    pub fn decode(filter: Option<&[u8]>, rollout: Option<&[u8]>) -> Result<Self, DecodeError> {
        let buckets = match filter {
            Some(bytes) if !bytes.is_empty() => Some(decode_buckets(bytes)?),
            _ => None,
        };
        let rollouts = match rollout {
            Some(bytes) => decode_rollouts(bytes)?,
            None => RolloutTable::default(),
        };

        let count: usize = buckets
            .as_deref()
            .map_or(0, |buckets| buckets.iter().map(Bucket::occupied).sum());
        let bucket_index_mask = buckets.as_deref().map_or(0, |buckets| buckets.len() - 1);

        tracing::debug!(
            buckets = buckets.as_deref().map_or(0, <[Bucket]>::len),
            items = count,
            rollouts = rollouts.len(),
            "decoded flag snapshot"
        );

        Ok(Self {
            buckets,
            bucket_index_mask,
            count,
            rollouts,
            _hasher: PhantomData,
        })
    }
}

/// Validate and unpack the bucket table.
fn decode_buckets(bytes: &[u8]) -> Result<Box<[Bucket]>, DecodeError> {
    if bytes.len() % BUCKET_SIZE != 0 {
        return Err(DecodeError::MalformedLength(bytes.len()));
    }
    let size = bytes.len() / BYTES_PER_BUCKET;
    if size < 1 {
        return Err(DecodeError::TooSmall(bytes.len()));
    }
    if !size.is_power_of_two() {
        return Err(DecodeError::NotPowerOfTwo(size));
    }

    let trailing = bytes.len() % BYTES_PER_BUCKET;
    if trailing != 0 {
        tracing::debug!(trailing, "ignoring bytes past the last whole bucket");
    }

    Ok(bytes
        .chunks_exact(BYTES_PER_BUCKET)
        .map(Bucket::from_le_bytes)
        .collect())
}

/// Validate and unpack the rollout entries.
fn decode_rollouts(bytes: &[u8]) -> Result<RolloutTable, DecodeError> {
    if bytes.len() % ROLLOUT_ENTRY_SIZE != 0 {
        return Err(DecodeError::MalformedRolloutLength(bytes.len()));
    }
    Ok(RolloutTable::from_entries(
        bytes.chunks_exact(ROLLOUT_ENTRY_SIZE).map(|chunk| {
            let mut entry = [0u8; ROLLOUT_ENTRY_SIZE];
            entry.copy_from_slice(chunk);
            u64::from_le_bytes(entry)
        }),
    ))
}
