//! Wire form of a flag snapshot.
//!
//! The flag service publishes snapshots as an object with two base64
//! fields, `filter` (the bucket table) and `rollout` (the rollout entries):
//!
//! ```json
//! {"filter": "AAAAAAAAAAChyQ...", "rollout": "MkVpBxSg9TI="}
//! ```
//!
//! Either field may be `null` or missing.

use crate::decode::DecodeError;
use crate::filter::Filter;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Raw snapshot tables as delivered by the flag service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Encoded bucket table
    #[serde(default, with = "base64_bytes")]
    pub filter: Option<Vec<u8>>,

    /// Encoded rollout entries
    #[serde(default, with = "base64_bytes")]
    pub rollout: Option<Vec<u8>>,
}

impl Snapshot {
    pub fn new(filter: Option<Vec<u8>>, rollout: Option<Vec<u8>>) -> Self {
        Self { filter, rollout }
    }

    /// Decode the tables into a [`Filter`].
    pub fn decode<H: Hasher + Default>(&self) -> Result<Filter<H>, DecodeError> {
        Filter::decode(self.filter.as_deref(), self.rollout.as_deref())
    }
}

impl<H: Hasher + Default> Filter<H> {
    /// Re-encode this filter into snapshot form.
    ///
    /// Rollout entries come out sorted by prefix, so a snapshot with
    /// duplicate prefixes does not round-trip byte for byte.
    pub fn to_snapshot(&self) -> Snapshot {
        let filter = self.buckets.as_deref().map(|buckets| {
            let mut bytes = Vec::with_capacity(buckets.len() * crate::BYTES_PER_BUCKET);
            for bucket in buckets {
                bucket.write_le_bytes(&mut bytes);
            }
            bytes
        });
        let rollout = (!self.rollouts.is_empty()).then(|| {
            self.rollouts
                .entries()
                .into_iter()
                .flat_map(u64::to_le_bytes)
                .collect()
        });
        Snapshot { filter, rollout }
    }
}

/// Serde adapter for optional byte buffers carried as base64 strings.
mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}
