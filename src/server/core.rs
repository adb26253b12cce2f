use crate::dependency::Graph;
use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureContext, FeatureDescriptor, FeatureRegistry, FeatureState};
use crate::options::{ParseOutcome, ProgramOptions};
use crate::server::{signal, ApplicationServerBuilder, ShutdownHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The central coordinator: registers features, resolves their order once,
/// and drives every feature through the phase sequence in lockstep.
///
/// Phase traversal is phase-major: each operation runs across the *entire*
/// resolved order before the next phase begins. Startup phases
/// (`collect_options` → `load_options` → `validate_options` → `prepare` →
/// `start`) run forward, `stop` runs in reverse, so a feature is always
/// stopped before the features it depends on.
///
/// # Concurrency model
///
/// One orchestrating task drives phase transitions sequentially; no two
/// features ever execute the same phase concurrently, so features need no
/// locking between each other during phase execution. A feature's `start`
/// may block for the lifetime of the process's useful work; shutdown intent
/// is carried by an atomic token observed at phase boundaries and inside any
/// long-running feature loop.
///
/// # Example
///
/// ```no_run
/// use keel::{ApplicationServer, FeatureDescriptor};
/// # use keel::Feature;
/// # #[derive(Debug)] struct LoggerFeature;
/// # impl Feature for LoggerFeature {
/// #     fn as_any(&self) -> &dyn std::any::Any { self }
/// #     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
/// # }
///
/// # async fn example() -> keel::Result<()> {
/// let mut server = ApplicationServer::builder()
///     .name("example")
///     .version("1.0.0")
///     .feature(FeatureDescriptor::new("logging"), Box::new(LoggerFeature))
///     .build()?;
///
/// let args: Vec<String> = std::env::args().collect();
/// server.run(args).await?;
/// # Ok(())
/// # }
/// ```
pub struct ApplicationServer {
    registry: Arc<FeatureRegistry>,
    /// Resolved total order; computed exactly once, immutable thereafter.
    order: Option<Vec<String>>,
    options: ProgramOptions,
    shutdown: ShutdownHandle,
    signal_task: Option<tokio::task::JoinHandle<()>>,
    ran: bool,
    /// Guard so the stop phase runs exactly once.
    stop_started: AtomicBool,
}

impl ApplicationServer {
    /// Create a builder for fluent composition. This is the preferred entry
    /// point: it registers all features before handing the server back.
    pub fn builder() -> ApplicationServerBuilder {
        ApplicationServerBuilder::new()
    }

    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        about: impl Into<String>,
    ) -> Self {
        Self {
            registry: Arc::new(FeatureRegistry::new()),
            order: None,
            options: ProgramOptions::new(name, about, version),
            shutdown: ShutdownHandle::new(),
            signal_task: None,
            ran: false,
            stop_started: AtomicBool::new(false),
        }
    }

    /// Register one feature. Must happen before composition is finalized;
    /// duplicate names fail here, not at run time.
    pub fn add_feature(
        &mut self,
        descriptor: FeatureDescriptor,
        feature: Box<dyn Feature>,
    ) -> Result<()> {
        if self.order.is_some() {
            return Err(Error::Config(
                "features cannot be registered after composition is finalized".to_string(),
            ));
        }
        let registry = Arc::get_mut(&mut self.registry).ok_or_else(|| {
            Error::Config("features cannot be registered while phases are running".to_string())
        })?;
        registry.insert(descriptor, feature)
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    /// Handle for requesting or observing shutdown from other tasks.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal shutdown intent. Idempotent and thread-safe; never invokes
    /// any feature's `stop` itself.
    pub fn begin_shutdown(&self) {
        self.shutdown.begin_shutdown();
    }

    /// Block until shutdown has been requested.
    pub async fn wait(&self) {
        self.shutdown.wait().await;
    }

    /// The resolved order, if composition has been finalized.
    pub fn resolved_order(&self) -> Option<&[String]> {
        self.order.as_deref()
    }

    /// Names of enabled features that requested elevated privileges — an
    /// advisory surface for the privilege-dropping collaborator.
    pub fn requires_elevated_privileges(&self) -> Vec<&str> {
        self.registry
            .entries()
            .iter()
            .filter(|e| e.is_enabled() && e.descriptor().needs_elevated_privileges())
            .map(|e| e.name())
            .collect()
    }

    /// Finalize composition: compute the total order over all registered
    /// features. Unregistered `starts_after` targets are ignored; a cycle
    /// aborts composition before any feature enters any phase. Idempotent —
    /// the order is computed once and reused.
    pub fn resolve_order(&mut self) -> Result<Vec<String>> {
        if let Some(order) = &self.order {
            return Ok(order.clone());
        }

        let mut graph = Graph::new();
        for entry in self.registry.entries() {
            graph.add_node(entry.name());
        }
        for entry in self.registry.entries() {
            for dep in entry.descriptor().dependencies() {
                if !graph.add_edge(entry.name(), dep) {
                    tracing::debug!(
                        feature = %entry.name(),
                        after = %dep,
                        "ignoring ordering constraint on unregistered feature"
                    );
                }
            }
        }

        let order = graph.topological_sort()?;
        tracing::debug!(order = ?order, "resolved feature order");
        self.order = Some(order.clone());
        Ok(order)
    }

    /// Finalize composition and drive all startup phases, then park until
    /// shutdown is requested (or return right away when a blocking feature
    /// already performed the process's work and requested shutdown itself),
    /// and finally run the stop phase.
    ///
    /// `args` are the raw process arguments (`args[0]` is the program name).
    /// Returns `Ok` after a clean shutdown; any fatal composition or
    /// configuration error is returned after a best-effort reverse stop of
    /// everything already prepared.
    pub async fn run(&mut self, args: Vec<String>) -> Result<()> {
        if self.ran {
            return Err(Error::Config("run() may only be called once".to_string()));
        }
        self.ran = true;

        let order = self.resolve_order()?;

        self.collect_options_phase(&order).await;
        if self.options.parse(&args)? == ParseOutcome::Exited {
            return Ok(());
        }
        self.load_options_phase(&order).await?;
        self.validate_options_phase(&order).await?;

        let elevated = self.requires_elevated_privileges();
        if !elevated.is_empty() {
            tracing::debug!(features = ?elevated, "features requesting elevated privileges");
        }

        self.signal_task = Some(signal::spawn_signal_listener(self.shutdown.clone()));

        if let Err(err) = self.prepare_phase(&order).await {
            self.stop().await;
            return Err(err);
        }

        if let Err(err) = self.start_phase(&order).await {
            self.stop().await;
            return Err(err);
        }

        if !self.shutdown.is_shutdown_requested() {
            self.shutdown.wait().await;
        }

        self.stop().await;
        Ok(())
    }

    async fn collect_options_phase(&mut self, order: &[String]) {
        for name in order {
            let Some(entry) = self.registry.get(name) else {
                continue;
            };
            let handle = entry.handle();
            let mut feature = handle.lock().await;
            feature.collect_options(&mut self.options);
            entry.set_state(FeatureState::OptionsCollected);
        }
    }

    async fn load_options_phase(&mut self, order: &[String]) -> Result<()> {
        for name in order {
            let Some(entry) = self.registry.get(name) else {
                continue;
            };
            let handle = entry.handle();
            let mut feature = handle.lock().await;
            if let Err(e) = feature.load_options(&mut self.options).await {
                return Err(Error::InvalidOptions {
                    feature: name.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validation runs for every feature, disabled or not, so disabling
    /// decisions apply uniformly. A failure disables optional features and
    /// is fatal for required ones.
    async fn validate_options_phase(&mut self, order: &[String]) -> Result<()> {
        for name in order {
            let Some(entry) = self.registry.get(name) else {
                continue;
            };
            let ctx = self.context_for(name);
            let handle = entry.handle();
            let mut feature = handle.lock().await;
            match feature.validate_options(&self.options, &ctx).await {
                Ok(()) => entry.set_state(FeatureState::OptionsValidated),
                Err(e) if entry.descriptor().is_optional() => {
                    tracing::warn!(
                        feature = %name,
                        error = %e,
                        "optional feature failed validation; disabling"
                    );
                    entry.disable();
                    entry.set_state(FeatureState::OptionsValidated);
                }
                Err(e) => {
                    return Err(Error::InvalidOptions {
                        feature: name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn prepare_phase(&self, order: &[String]) -> Result<()> {
        for name in order {
            let Some(entry) = self.registry.get(name) else {
                continue;
            };
            if !entry.is_enabled() {
                continue;
            }
            let ctx = self.context_for(name);
            let handle = entry.handle();
            let mut feature = handle.lock().await;
            tracing::debug!(feature = %name, "preparing");
            if let Err(e) = feature.prepare(&ctx).await {
                return Err(Error::PrepareFailed {
                    feature: name.clone(),
                    reason: e.to_string(),
                });
            }
            entry.set_state(FeatureState::Prepared);
        }
        Ok(())
    }

    async fn start_phase(&self, order: &[String]) -> Result<()> {
        for name in order {
            // Shutdown is observed at phase boundaries; a request that
            // arrived while an earlier feature started skips the rest.
            if self.shutdown.is_shutdown_requested() {
                tracing::info!("shutdown requested; skipping remaining start phase");
                break;
            }
            let Some(entry) = self.registry.get(name) else {
                continue;
            };
            if !entry.is_enabled() {
                continue;
            }
            let ctx = self.context_for(name);
            let handle = entry.handle();
            let mut feature = handle.lock().await;
            tracing::debug!(feature = %name, "starting");
            if let Err(e) = feature.start(&ctx).await {
                return Err(Error::StartFailed {
                    feature: name.clone(),
                    reason: e.to_string(),
                });
            }
            entry.set_state(FeatureState::Started);
        }
        Ok(())
    }

    /// Drive the stop phase in reverse resolved order. Only features that
    /// completed `prepare` are stopped; individual failures are logged and
    /// swallowed so one feature's cleanup cannot prevent another's. Runs at
    /// most once.
    pub async fn stop(&self) {
        let Some(order) = &self.order else {
            return;
        };

        if self
            .stop_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if let Some(task) = &self.signal_task {
            task.abort();
        }

        for name in order.iter().rev() {
            let Some(entry) = self.registry.get(name) else {
                continue;
            };
            if !entry.is_enabled() {
                continue;
            }
            let state = entry.state();
            if !matches!(state, FeatureState::Prepared | FeatureState::Started) {
                continue;
            }
            entry.set_state(FeatureState::Stopping);
            let ctx = self.context_for(name);
            let handle = entry.handle();
            let mut feature = handle.lock().await;
            tracing::debug!(feature = %name, "stopping");
            if let Err(e) = feature.stop(&ctx).await {
                tracing::warn!(feature = %name, error = %e, "error while stopping feature (ignored)");
            }
            entry.set_state(FeatureState::Stopped);
        }
    }

    fn context_for(&self, name: &str) -> FeatureContext {
        FeatureContext::new(Arc::clone(&self.registry), self.shutdown.clone(), name)
    }
}

impl Drop for ApplicationServer {
    fn drop(&mut self) {
        if let Some(task) = &self.signal_task {
            task.abort();
        }
    }
}
