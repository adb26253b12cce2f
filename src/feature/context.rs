use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureEntry, FeatureRegistry, FeatureState, SharedFeature};
use crate::server::ShutdownHandle;
use std::sync::Arc;

/// Per-phase-call view a feature gets of the rest of the composition.
///
/// Lookups are valid from validation onward; a target that has not yet
/// collected its own options cannot be consulted, and a feature cannot look
/// itself up (it already holds its own lock while its phase runs).
#[derive(Debug, Clone)]
pub struct FeatureContext {
    registry: Arc<FeatureRegistry>,
    shutdown: ShutdownHandle,
    current: String,
}

impl FeatureContext {
    pub(crate) fn new(
        registry: Arc<FeatureRegistry>,
        shutdown: ShutdownHandle,
        current: &str,
    ) -> Self {
        Self {
            registry,
            shutdown,
            current: current.to_string(),
        }
    }

    /// Name of the feature this context was handed to.
    pub fn current(&self) -> &str {
        &self.current
    }

    fn lookup_entry(&self, name: &str) -> Result<&Arc<FeatureEntry>> {
        if name == self.current {
            return Err(Error::SelfLookup(name.to_string()));
        }
        let entry = self.registry.entry(name)?;
        if entry.state() < FeatureState::OptionsCollected {
            return Err(Error::FeatureNotReady {
                feature: name.to_string(),
                state: entry.state().to_string(),
            });
        }
        Ok(entry)
    }

    /// Shared handle to a sibling feature.
    pub fn feature(&self, name: &str) -> Result<SharedFeature> {
        Ok(self.lookup_entry(name)?.handle())
    }

    /// Lock a sibling and read it through its concrete capability type.
    /// Fails fast with [`Error::CapabilityMismatch`] when the registered
    /// feature is not a `T`.
    pub async fn with_feature<T, R, F>(&self, name: &str, f: F) -> Result<R>
    where
        T: Feature + 'static,
        F: FnOnce(&T) -> R,
    {
        let handle = self.lookup_entry(name)?.handle();
        let guard = handle.lock().await;
        let concrete = guard
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| Error::CapabilityMismatch {
                feature: name.to_string(),
                capability: std::any::type_name::<T>(),
            })?;
        Ok(f(concrete))
    }

    /// Like [`with_feature`](Self::with_feature), but with mutable access —
    /// how one feature reconfigures another during validation.
    pub async fn with_feature_mut<T, R, F>(&self, name: &str, f: F) -> Result<R>
    where
        T: Feature + 'static,
        F: FnOnce(&mut T) -> R,
    {
        let handle = self.lookup_entry(name)?.handle();
        let mut guard = handle.lock().await;
        let concrete =
            guard
                .as_any_mut()
                .downcast_mut::<T>()
                .ok_or_else(|| Error::CapabilityMismatch {
                    feature: name.to_string(),
                    capability: std::any::type_name::<T>(),
                })?;
        Ok(f(concrete))
    }

    /// Disable a feature (self included). Only meaningful during the
    /// validation phase; idempotent and lock-free, so always safe.
    pub fn disable(&self, name: &str) -> Result<()> {
        self.registry.disable(name)
    }

    pub fn is_enabled(&self, name: &str) -> Result<bool> {
        self.registry.is_enabled(name)
    }

    /// Handle for requesting or observing process shutdown. Blocking
    /// features select on this inside their `start` loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureDescriptor;
    use std::any::Any;

    #[derive(Debug)]
    struct EchoFeature;

    impl Feature for EchoFeature {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct OtherFeature;

    impl Feature for OtherFeature {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn validated_registry() -> Arc<FeatureRegistry> {
        let mut registry = FeatureRegistry::new();
        registry
            .insert(FeatureDescriptor::new("echo"), Box::new(EchoFeature))
            .unwrap();
        registry
            .entry("echo")
            .unwrap()
            .set_state(FeatureState::OptionsValidated);
        Arc::new(registry)
    }

    #[tokio::test]
    async fn typed_lookup_downcasts_to_the_capability() {
        let ctx = FeatureContext::new(validated_registry(), ShutdownHandle::new(), "driver");
        let seen = ctx
            .with_feature::<EchoFeature, _, _>("echo", |_| true)
            .await
            .unwrap();
        assert!(seen);
    }

    #[tokio::test]
    async fn wrong_capability_fails_fast() {
        let ctx = FeatureContext::new(validated_registry(), ShutdownHandle::new(), "driver");
        let err = ctx
            .with_feature::<OtherFeature, _, _>("echo", |_| ())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityMismatch { .. }));
    }

    #[tokio::test]
    async fn self_lookup_is_rejected() {
        let ctx = FeatureContext::new(validated_registry(), ShutdownHandle::new(), "echo");
        assert!(matches!(ctx.feature("echo"), Err(Error::SelfLookup(_))));
    }

    #[tokio::test]
    async fn lookup_before_option_collection_is_rejected() {
        let mut registry = FeatureRegistry::new();
        registry
            .insert(FeatureDescriptor::new("early"), Box::new(EchoFeature))
            .unwrap();
        let ctx = FeatureContext::new(Arc::new(registry), ShutdownHandle::new(), "driver");
        assert!(matches!(
            ctx.feature("early"),
            Err(Error::FeatureNotReady { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_lookup_is_rejected() {
        let ctx = FeatureContext::new(validated_registry(), ShutdownHandle::new(), "driver");
        assert!(matches!(ctx.feature("ghost"), Err(Error::UnknownFeature(_))));
    }
}
