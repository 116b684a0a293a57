use crate::decode::DecodeError;
use crate::filter::Filter;
use crate::rollout;
use crate::snapshot::Snapshot;
use derive_builder::Builder;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Holder of the current [`Filter`] for a process.
///
/// ## Concurrency Model
///
/// - **Reads**: [`check`](Self::check) clones the current `Arc<Filter>` under a
///   short read lock and queries it without holding the lock. A reader always
///   sees one whole filter, never a mix of an old bucket table with a new
///   rollout table.
/// - **Replacement**: a new filter is decoded off to the side and swapped in
///   with a single pointer write. Readers still holding the old filter keep
///   using it until they drop it.
///
/// The store starts with the fail-safe filter, so every check answers
/// `false` until a snapshot has been installed.
///
/// ## Test Mode
///
/// With `test_mode` enabled, features named through
/// [`FlagStoreBuilder::override_feature`] are always enabled. Overrides match
/// the feature part of a key, so overriding `new_ui` enables `new_ui:user:1`.
#[derive(Debug, Builder)]
#[builder(
    pattern = "owned",
    build_fn(private, name = "base_build", validate = "Self::validate")
)]
pub struct FlagStore {
    /// Honour feature overrides. Keep off outside of local development.
    #[builder(default)]
    test_mode: bool,

    /// Feature keys forced on in test mode
    #[builder(default, setter(custom))]
    overrides: HashSet<String>,

    #[builder(setter(skip))]
    current: RwLock<Arc<Filter>>,
}

impl FlagStore {
    /// Create a new FlagStoreBuilder with default settings
    pub fn builder() -> FlagStoreBuilder {
        FlagStoreBuilder::default()
    }

    /// Create a store holding the fail-safe filter, without overrides
    pub fn new() -> Self {
        Self::from_filter(Filter::default())
    }

    /// Create a store starting from an already decoded filter
    pub fn from_filter(filter: Filter) -> Self {
        Self {
            test_mode: false,
            overrides: HashSet::new(),
            current: RwLock::new(Arc::new(filter)),
        }
    }

    /// Check a feature key, returning `true` if it is enabled.
    pub fn check(&self, key: &str) -> bool {
        self.check_bytes(key.as_bytes())
    }

    /// Check a feature key given as raw bytes.
    pub fn check_bytes(&self, key: &[u8]) -> bool {
        if self.is_overridden(key) {
            return true;
        }
        self.current().lookup(key)
    }

    /// Get a handle to the filter currently answering checks
    pub fn current(&self) -> Arc<Filter> {
        self.current.read().clone()
    }

    /// Decode a snapshot and, only if that succeeds, make it current.
    ///
    /// On error the previous filter stays in place and keeps answering.
    pub fn install(&self, snapshot: &Snapshot) -> Result<(), DecodeError> {
        let filter: Filter = snapshot.decode().inspect_err(|error| {
            tracing::warn!(%error, "rejected flag snapshot, keeping the current filter");
        })?;
        tracing::info!(
            buckets = filter.num_buckets(),
            items = filter.len(),
            rollouts = filter.rollout_len(),
            "installed flag snapshot"
        );
        self.replace(filter);
        Ok(())
    }

    /// Swap in a new filter, returning the one it replaced
    pub fn replace(&self, filter: Filter) -> Arc<Filter> {
        std::mem::replace(&mut *self.current.write(), Arc::new(filter))
    }

    /// Go back to the fail-safe filter, disabling every feature
    pub fn reset(&self) -> Arc<Filter> {
        tracing::info!("reset to the fail-safe flag filter");
        self.replace(Filter::default())
    }

    /// Check if test mode is enabled
    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    fn is_overridden(&self, key: &[u8]) -> bool {
        if !self.test_mode || self.overrides.is_empty() {
            return false;
        }
        std::str::from_utf8(rollout::feature_key(key))
            .is_ok_and(|feature| self.overrides.contains(feature))
    }
}

impl Default for FlagStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagStoreBuilder {
    /// Force a feature on while in test mode
    pub fn override_feature(mut self, feature: impl Into<String>) -> Self {
        self.overrides
            .get_or_insert_with(HashSet::new)
            .insert(feature.into());
        self
    }

    /// Validate the builder configuration
    fn validate(&self) -> Result<(), String> {
        if let Some(overrides) = &self.overrides
            && !overrides.is_empty()
            && self.test_mode != Some(true)
        {
            return Err("feature overrides require test_mode".into());
        }
        Ok(())
    }

    /// Build a FlagStore with the specified configuration
    pub fn build(self) -> Result<FlagStore, FlagStoreBuilderError> {
        let store = self.base_build()?;
        if store.test_mode {
            tracing::warn!(
                overrides = store.overrides.len(),
                "flag store running in test mode"
            );
        }
        Ok(store)
    }
}
