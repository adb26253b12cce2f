use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureDescriptor, FeatureState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle to a live feature. Phase calls hold the lock for the whole
/// call; sibling lookups lock a *different* feature, which is safe because
/// no two features execute a phase concurrently.
pub type SharedFeature = Arc<tokio::sync::Mutex<Box<dyn Feature>>>;

/// One registry slot: the immutable descriptor plus the mutable runtime
/// state the server tracks for it.
#[derive(Debug)]
pub struct FeatureEntry {
    descriptor: FeatureDescriptor,
    enabled: AtomicBool,
    state: parking_lot::Mutex<FeatureState>,
    feature: SharedFeature,
}

impl FeatureEntry {
    fn new(descriptor: FeatureDescriptor, feature: Box<dyn Feature>) -> Self {
        Self {
            descriptor,
            enabled: AtomicBool::new(true),
            state: parking_lot::Mutex::new(FeatureState::Constructed),
            feature: Arc::new(tokio::sync::Mutex::new(feature)),
        }
    }

    pub fn descriptor(&self) -> &FeatureDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Idempotent; a disabled feature stays in the resolved order and
    /// remains a valid lookup target, it just skips prepare/start/stop.
    pub(crate) fn disable(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            tracing::debug!(feature = %self.name(), "feature disabled");
        }
    }

    pub fn state(&self) -> FeatureState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: FeatureState) {
        *self.state.lock() = state;
    }

    pub fn handle(&self) -> SharedFeature {
        Arc::clone(&self.feature)
    }
}

/// Name → feature mapping, built once during registration and read-only
/// thereafter except for the per-entry enabled flag.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    entries: Vec<Arc<FeatureEntry>>,
    index: HashMap<String, usize>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one feature. Duplicate names are a configuration error,
    /// caught here rather than at run time.
    pub(crate) fn insert(
        &mut self,
        descriptor: FeatureDescriptor,
        feature: Box<dyn Feature>,
    ) -> Result<()> {
        let name = descriptor.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateFeature(name));
        }
        self.index.insert(name, self.entries.len());
        self.entries
            .push(Arc::new(FeatureEntry::new(descriptor, feature)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FeatureEntry>> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn entry(&self, name: &str) -> Result<&Arc<FeatureEntry>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownFeature(name.to_string()))
    }

    /// Lookup by name. Disabled features are valid targets, just inert;
    /// only a never-registered name fails.
    pub fn feature(&self, name: &str) -> Result<SharedFeature> {
        Ok(self.entry(name)?.handle())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[Arc<FeatureEntry>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn disable(&self, name: &str) -> Result<()> {
        self.entry(name)?.disable();
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> Result<bool> {
        Ok(self.entry(name)?.is_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    #[derive(Debug)]
    struct NullFeature;

    impl Feature for NullFeature {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn registry_with(names: &[&str]) -> FeatureRegistry {
        let mut registry = FeatureRegistry::new();
        for name in names {
            registry
                .insert(FeatureDescriptor::new(*name), Box::new(NullFeature))
                .unwrap();
        }
        registry
    }

    #[test]
    fn duplicate_names_are_rejected_at_registration() {
        let mut registry = registry_with(&["x"]);
        let err = registry
            .insert(FeatureDescriptor::new("x"), Box::new(NullFeature))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateFeature(name) if name == "x"));
    }

    #[test]
    fn unknown_lookup_fails() {
        let registry = registry_with(&["a"]);
        assert!(matches!(
            registry.feature("ghost"),
            Err(Error::UnknownFeature(_))
        ));
    }

    #[test]
    fn disabled_features_remain_valid_lookup_targets() {
        let registry = registry_with(&["a"]);
        registry.disable("a").unwrap();
        registry.disable("a").unwrap(); // idempotent
        assert!(!registry.is_enabled("a").unwrap());
        assert!(registry.feature("a").is_ok());
    }

    #[test]
    fn entries_keep_registration_order() {
        let registry = registry_with(&["c", "a", "b"]);
        let names: Vec<_> = registry.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn state_starts_constructed() {
        let registry = registry_with(&["a"]);
        let entry = registry.entry("a").unwrap();
        assert_eq!(entry.state(), FeatureState::Constructed);
        entry.set_state(FeatureState::OptionsCollected);
        assert_eq!(entry.state(), FeatureState::OptionsCollected);
    }
}
