// Local Feature Flag Evaluation over Cuckoo Filter Snapshots
// Decodes the compact snapshots published by a flag service into an immutable
// cuckoo-filter-style membership table plus a percentage rollout table, and
// answers "is this feature enabled for this actor" without a network round trip.

//! Evaluate feature flags locally from a decoded snapshot.
//!
//! A snapshot carries two tables:
//!
//! - a **bucket table** of 16-bit fingerprints for explicitly enabled keys,
//!   queried with cuckoo-filter double hashing, and
//! - a **rollout table** of per-feature percentages, queried with a stable
//!   hash bucket of the full key.
//!
//! Keys are usually `<feature>:<resource>:<actor>`, e.g. `new_ui:user:42`.
//!
//! ```
//! use flag_cuckoo::{FlagStore, Snapshot};
//!
//! let store = FlagStore::new();
//! // Fail closed until a snapshot is installed
//! assert!(!store.check("test_team_feature:user:4"));
//!
//! let rollout = vec![0x32, 0x45, 0x69, 0x07, 0x14, 0xa0, 0xf5, 0x32];
//! store.install(&Snapshot::new(None, Some(rollout))).unwrap();
//! assert!(store.check("test_team_feature:user:4"));
//! assert!(!store.check("test_team_feature:user:1"));
//! ```

mod decode;
mod filter;
mod hash;
mod rollout;
mod snapshot;
mod store;

pub use decode::DecodeError;
pub use filter::{BUCKET_SIZE, BYTES_PER_BUCKET, Filter, MAX_FINGERPRINT};
pub use hash::Fnv1a64;
pub use snapshot::Snapshot;
pub use store::{FlagStore, FlagStoreBuilder, FlagStoreBuilderError};
