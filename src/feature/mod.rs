//! The feature contract and its registry.
//!
//! A *feature* is a pluggable process component: it declares an identity and
//! ordering constraints ([`FeatureDescriptor`]), implements the phase
//! contract ([`Feature`]), and is driven through its [`FeatureState`]s by the
//! application server. The [`FeatureRegistry`] maps names to live instances
//! and supports the sibling lookups features perform from validation onward.

mod context;
mod descriptor;
mod lifecycle;
mod registry;

pub use context::FeatureContext;
pub use descriptor::FeatureDescriptor;
pub use lifecycle::{Feature, FeatureState};
pub use registry::{FeatureEntry, FeatureRegistry, SharedFeature};
