use crate::error::Result;
use crate::feature::FeatureContext;
use crate::options::ProgramOptions;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;

/// Where a feature sits in its lifecycle. Transitions are applied only by
/// the application server, strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureState {
    Constructed,
    OptionsCollected,
    OptionsValidated,
    Prepared,
    Started,
    Stopping,
    Stopped,
}

impl fmt::Display for FeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Constructed => "constructed",
            Self::OptionsCollected => "options collected",
            Self::OptionsValidated => "options validated",
            Self::Prepared => "prepared",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// The lifecycle contract every feature implements.
///
/// The server invokes each operation for *all* features (in resolved order)
/// before moving to the next phase. Startup phases run forward, `stop` runs
/// in reverse, so a feature is always stopped before the features it depends
/// on.
///
/// Phase rules:
///
/// - `collect_options` is a pure declaration and must not fail; it must not
///   depend on any other feature's state.
/// - `load_options` runs right after parsing, before any validation — the
///   place to eagerly apply configuration that later features need (the
///   logger installs the global subscriber here). Errors are fatal.
/// - `validate_options` may look siblings up through the context, may
///   disable features (the only phase allowed to), and may reject the
///   configuration. A rejection is fatal for required features and disables
///   optional ones.
/// - `prepare` allocates resources without observable side effects; errors
///   abort the process after a best-effort reverse unwind.
/// - `start` begins active behavior and is allowed to block the calling
///   thread for the lifetime of the process's useful work; a blocking
///   feature must observe the shutdown handle to exit its loop.
/// - `stop` releases everything from `start`/`prepare`, must tolerate a
///   partial start, and must be idempotent. Errors are logged by the server,
///   never propagated.
///
/// A feature disabled by the end of `validate_options` is skipped for
/// `prepare`, `start` and `stop`, but still occupies its slot in the
/// resolved order and remains a valid lookup target.
#[async_trait]
pub trait Feature: Send + Sync + fmt::Debug {
    /// Declare configuration slots. Pure declaration; must not fail.
    fn collect_options(&mut self, _options: &mut ProgramOptions) {}

    /// Eagerly apply parsed configuration before anyone validates.
    async fn load_options(&mut self, _options: &mut ProgramOptions) -> Result<()> {
        Ok(())
    }

    /// Inspect parsed configuration; may consult and disable siblings.
    async fn validate_options(
        &mut self,
        _options: &ProgramOptions,
        _ctx: &FeatureContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Allocate resources that do not yet perform observable side effects.
    async fn prepare(&mut self, _ctx: &FeatureContext) -> Result<()> {
        Ok(())
    }

    /// Begin active behavior; may block until shutdown is requested.
    async fn start(&mut self, _ctx: &FeatureContext) -> Result<()> {
        Ok(())
    }

    /// Best-effort cleanup; safe after a partial start, idempotent.
    async fn stop(&mut self, _ctx: &FeatureContext) -> Result<()> {
        Ok(())
    }

    /// Downcast hook for typed capability lookup.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
