use std::collections::HashMap;

/// Size in bytes of one packed rollout entry.
pub(crate) const ROLLOUT_ENTRY_SIZE: usize = 8;

/// Mask selecting the percentage stored in the low byte of an entry.
const PERCENTAGE_MASK: u64 = 0xff;

/// Delimiter separating the feature key from the actor part of a key,
/// e.g. `feature:user:1`.
const FEATURE_DELIMITER: u8 = b':';

/// Percentage rollouts keyed by the top 56 bits of the feature key hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RolloutTable {
    percentages: HashMap<u64, u8>,
}

impl RolloutTable {
    /// Unpack 64-bit entries: the high 56 bits are the key prefix and the
    /// low byte the percentage. Later entries win on duplicate prefixes.
    pub(crate) fn from_entries(entries: impl IntoIterator<Item = u64>) -> Self {
        let percentages = entries
            .into_iter()
            .map(|entry| (prefix(entry), (entry & PERCENTAGE_MASK) as u8))
            .collect();
        Self { percentages }
    }

    /// Percentage configured for a prefix, if any.
    pub(crate) fn get(&self, prefix: u64) -> Option<u8> {
        self.percentages.get(&prefix).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.percentages.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.percentages.is_empty()
    }

    /// Packed entries sorted by prefix.
    pub(crate) fn entries(&self) -> Vec<u64> {
        let mut entries: Vec<u64> = self
            .percentages
            .iter()
            .map(|(&prefix, &percentage)| prefix | percentage as u64)
            .collect();
        entries.sort_unstable();
        entries
    }
}

/// Clear the low byte of a hash, leaving the 56-bit lookup prefix.
pub(crate) fn prefix(hash: u64) -> u64 {
    hash & !PERCENTAGE_MASK
}

/// Extract the feature part of a key.
///
/// Keys are usually `<feature>:<resource>:<actor>`. Everything from the first
/// `:` onwards is dropped; a key without a delimiter, or one starting with it,
/// is used whole.
pub(crate) fn feature_key(key: &[u8]) -> &[u8] {
    match key.iter().position(|&b| b == FEATURE_DELIMITER) {
        Some(index) if index > 0 => &key[..index],
        _ => key,
    }
}
