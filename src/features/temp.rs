use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureContext, FeatureDescriptor};
use crate::features::LoggerFeature;
use crate::options::{Parameter, ProgramOptions};
use async_trait::async_trait;
use std::any::Any;
use std::path::{Path, PathBuf};

/// Owns the process-scoped temporary directory: created during `prepare`
/// (no observable side effects beyond the directory itself), removed during
/// `stop`. Siblings reach it through [`TempFeature::path`].
#[derive(Debug, Default)]
pub struct TempFeature {
    parent: Option<PathBuf>,
    dir: Option<tempfile::TempDir>,
}

impl TempFeature {
    pub const NAME: &'static str = "temp";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor() -> FeatureDescriptor {
        FeatureDescriptor::new(Self::NAME).starts_after(LoggerFeature::NAME)
    }

    /// The temp directory, available from `prepare` until `stop`.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(tempfile::TempDir::path)
    }
}

#[async_trait]
impl Feature for TempFeature {
    fn collect_options(&mut self, options: &mut ProgramOptions) {
        options.add_section("temp", "Temporary files");
        options.add_option(
            "temp.path",
            "parent directory for the process temp directory",
            Parameter::String { default: None },
        );
    }

    async fn validate_options(
        &mut self,
        options: &ProgramOptions,
        _ctx: &FeatureContext,
    ) -> Result<()> {
        self.parent = options.string("temp.path").map(PathBuf::from);
        if let Some(parent) = &self.parent {
            if parent.exists() && !parent.is_dir() {
                return Err(Error::Options(format!(
                    "temp.path '{}' exists but is not a directory",
                    parent.display()
                )));
            }
        }
        Ok(())
    }

    async fn prepare(&mut self, _ctx: &FeatureContext) -> Result<()> {
        let dir = match &self.parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                tempfile::Builder::new().prefix("keel-").tempdir_in(parent)?
            }
            None => tempfile::Builder::new().prefix("keel-").tempdir()?,
        };
        tracing::debug!(path = %dir.path().display(), "created process temp directory");
        self.dir = Some(dir);
        Ok(())
    }

    async fn stop(&mut self, _ctx: &FeatureContext) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove temp directory");
            } else {
                tracing::debug!(path = %path.display(), "removed process temp directory");
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
