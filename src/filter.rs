use crate::hash::{Fnv1a64, hash_bytes};
use crate::rollout::{self, RolloutTable};
use std::hash::Hasher;
use std::marker::PhantomData;

/// Number of fingerprint slots in each bucket.
pub const BUCKET_SIZE: usize = 4;

/// Number of bytes encoding a single bucket: four little-endian `u16` slots.
pub const BYTES_PER_BUCKET: usize = BUCKET_SIZE * 16 / 8;

/// Largest value a 16-bit fingerprint could take. Fingerprints are reduced
/// modulo `MAX_FINGERPRINT - 1` and shifted by one, so they fall in
/// `1..=65534` and never collide with the empty slot.
pub const MAX_FINGERPRINT: u64 = (1 << 16) - 1;

/// A fixed-width group of fingerprint slots. `0` marks an empty slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Bucket([u16; BUCKET_SIZE]);

impl Bucket {
    /// Read a bucket from exactly `BYTES_PER_BUCKET` little-endian bytes.
    pub(crate) fn from_le_bytes(bytes: &[u8]) -> Self {
        let mut slots = [0u16; BUCKET_SIZE];
        for (slot, pair) in slots.iter_mut().zip(bytes.chunks_exact(2)) {
            *slot = u16::from_le_bytes([pair[0], pair[1]]);
        }
        Self(slots)
    }

    /// Append the little-endian encoding of this bucket to `out`.
    pub(crate) fn write_le_bytes(&self, out: &mut Vec<u8>) {
        for slot in self.0 {
            out.extend_from_slice(&slot.to_le_bytes());
        }
    }

    /// Number of occupied slots.
    pub(crate) fn occupied(&self) -> usize {
        self.0.iter().filter(|&&slot| slot != 0).count()
    }

    fn contains(&self, fingerprint: u16) -> bool {
        self.0.contains(&fingerprint)
    }
}

/// An immutable, decoded flag snapshot.
///
/// ## Structure
///
/// - **Bucket table**: a power-of-two number of [`BUCKET_SIZE`]-slot buckets
///   holding 16-bit fingerprints of enabled keys. Each fingerprint lives in
///   one of two buckets: its primary bucket (low bits of the key hash) or an
///   alternate bucket obtained by XOR-ing the primary index with the hash of
///   the fingerprint itself.
/// - **Rollout table**: per-feature percentages. An actor key is enabled when
///   the hash of the full key, modulo 100, is at or below the percentage of
///   its feature.
///
/// A filter is built once by [`Filter::decode`] and never modified
/// afterwards, so any number of threads can query it without locking. New
/// snapshots produce new filters; see [`FlagStore`](crate::FlagStore) for
/// swapping them in.
///
/// [`Filter::default`] is the fail-safe filter: every lookup returns `false`.
///
/// ## Time Complexity
///
/// - **Lookup**: O(1), at most two bucket probes and one table lookup
/// - **Decode**: O(n) in the snapshot size
#[derive(Debug)]
pub struct Filter<H = Fnv1a64>
where
    H: Hasher + Default,
{
    /// Decoded buckets, `None` when the snapshot carried no bucket table
    pub(crate) buckets: Option<Box<[Bucket]>>,

    /// `buckets.len() - 1`, replaces modulo in index arithmetic
    pub(crate) bucket_index_mask: usize,

    /// Number of occupied slots across all buckets
    pub(crate) count: usize,

    pub(crate) rollouts: RolloutTable,

    pub(crate) _hasher: PhantomData<H>,
}

impl<H: Hasher + Default> Filter<H> {
    /// Check whether `key` is enabled, either by its feature's rollout
    /// percentage or by membership in the bucket table.
    ///
    /// Never fails: keys without a `:` or empty keys go through the same
    /// lookups and resolve to `false` unless a table says otherwise. The
    /// fail-safe filter always answers `false`.
    pub fn lookup(&self, key: &[u8]) -> bool {
        if self.is_fail_safe() {
            return false;
        }
        self.enabled_by_rollout(key) || self.contains(key)
    }

    /// Check if a key is in the bucket table
    ///
    /// Returns `true` if the key is possibly in the table (may have false positives),
    /// `false` if it is definitely not, or if there is no bucket table at all.
    pub fn contains(&self, key: &[u8]) -> bool {
        let Some(buckets) = self.buckets.as_deref() else {
            return false;
        };
        let (index, fingerprint) = self.index_and_fingerprint(key);
        if buckets[index].contains(fingerprint) {
            return true;
        }
        buckets[self.alt_index(index, fingerprint)].contains(fingerprint)
    }

    /// Check if the rollout of the key's feature enables this key.
    ///
    /// The feature part of the key selects the percentage (0 when the
    /// feature has no rollout). The full key picks a stable bucket in
    /// `0..100`, so raising a percentage only ever adds actors.
    pub fn enabled_by_rollout(&self, key: &[u8]) -> bool {
        let feature_hash = self.hash(rollout::feature_key(key));
        let percentage = self
            .rollouts
            .get(rollout::prefix(feature_hash))
            .unwrap_or(0);
        // Everyone is in at 100, skip hashing the full key
        if percentage == 100 {
            return true;
        }
        self.rollout_bucket(key) <= percentage
    }

    /// Get the number of occupied fingerprint slots
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the bucket table holds no fingerprints
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Get the number of buckets, 0 without a bucket table
    pub fn num_buckets(&self) -> usize {
        self.buckets.as_deref().map_or(0, <[Bucket]>::len)
    }

    /// Get the number of fingerprint slots
    pub fn capacity(&self) -> usize {
        self.num_buckets() * BUCKET_SIZE
    }

    /// Get the number of features with a rollout percentage
    pub fn rollout_len(&self) -> usize {
        self.rollouts.len()
    }

    /// Rollout percentage configured for a feature key, if any.
    pub fn rollout_percentage(&self, feature: &[u8]) -> Option<u8> {
        self.rollouts.get(rollout::prefix(self.hash(feature)))
    }

    /// True when there is neither a bucket table nor any rollout, i.e. the
    /// filter used before any snapshot has been decoded.
    pub fn is_fail_safe(&self) -> bool {
        self.buckets.is_none() && self.rollouts.is_empty()
    }

    fn hash(&self, data: &[u8]) -> u64 {
        hash_bytes::<H>(data)
    }

    /// Bucket in `0..100` assigned to a full key for rollout decisions.
    fn rollout_bucket(&self, key: &[u8]) -> u8 {
        (self.hash(key) % 100) as u8
    }

    /// Compute the primary bucket index and fingerprint for a key.
    ///
    /// The fingerprint comes from the top 16 bits of the hash, reduced into
    /// `1..=65534`; the index from the low bits masked by the table size.
    fn index_and_fingerprint(&self, key: &[u8]) -> (usize, u16) {
        let hash = self.hash(key);
        let fingerprint = ((hash >> 48) % (MAX_FINGERPRINT - 1) + 1) as u16;
        let index = hash as usize & self.bucket_index_mask;
        (index, fingerprint)
    }

    /// Computes the alternate bucket index for a fingerprint.
    ///
    /// `alt_index(alt_index(i, f), f) == i` for any index `i` and fingerprint `f`.
    fn alt_index(&self, index: usize, fingerprint: u16) -> usize {
        (index ^ self.hash(&fingerprint.to_le_bytes()) as usize) & self.bucket_index_mask
    }
}

impl<H: Hasher + Default> Default for Filter<H> {
    /// The fail-safe filter: no bucket table, no rollouts
    fn default() -> Self {
        Self {
            buckets: None,
            bucket_index_mask: 0,
            count: 0,
            rollouts: RolloutTable::default(),
            _hasher: PhantomData,
        }
    }
}
