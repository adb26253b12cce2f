use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureDescriptor};
use crate::server::ApplicationServer;

/// Builder for composing an [`ApplicationServer`] with a fluent API.
///
/// Composition code registers every feature here; `build()` performs the
/// registrations in order, so duplicate names surface before any phase runs.
///
/// # Example
///
/// ```no_run
/// use keel::{ApplicationServer, FeatureDescriptor};
/// use keel::features::LoggerFeature;
///
/// # fn example() -> keel::Result<()> {
/// let server = ApplicationServer::builder()
///     .name("keelsh")
///     .version(env!("CARGO_PKG_VERSION"))
///     .about("interactive client shell")
///     .feature(LoggerFeature::descriptor(), Box::new(LoggerFeature::new()))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ApplicationServerBuilder {
    name: Option<String>,
    version: String,
    about: String,
    features: Vec<(FeatureDescriptor, Box<dyn Feature>)>,
}

impl ApplicationServerBuilder {
    pub fn new() -> Self {
        Self {
            name: None,
            version: "0.0.0".to_string(),
            about: String::new(),
            features: Vec::new(),
        }
    }

    /// Application name, shown in `--help`. Required.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = about.into();
        self
    }

    /// Queue a feature registration. Registration order is the tie-breaker
    /// for the resolved order, so it is part of the composition contract.
    pub fn feature(mut self, descriptor: FeatureDescriptor, feature: Box<dyn Feature>) -> Self {
        self.features.push((descriptor, feature));
        self
    }

    /// Build the server and register all queued features.
    pub fn build(self) -> Result<ApplicationServer> {
        let name = self
            .name
            .ok_or_else(|| Error::Config("application name is required".to_string()))?;

        let mut server = ApplicationServer::new(name, self.version, self.about);
        for (descriptor, feature) in self.features {
            server.add_feature(descriptor, feature)?;
        }
        Ok(server)
    }
}

impl Default for ApplicationServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
