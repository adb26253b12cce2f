#![allow(dead_code)]

use async_trait::async_trait;
use keel::{Error, Feature, FeatureContext, ProgramOptions, Result};
use std::any::Any;
use std::sync::{Arc, Mutex};

/// Shared record of every phase call, in invocation order, as
/// `"<feature>:<phase>"` entries.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// A feature that records every phase call and can be told to misbehave at
/// a given phase.
#[derive(Debug)]
pub struct ProbeFeature {
    name: &'static str,
    journal: Journal,
    fail_validate: bool,
    fail_prepare: bool,
    fail_start: bool,
    disable_self: bool,
    request_shutdown_on_start: bool,
    block_until_shutdown: bool,
}

impl ProbeFeature {
    pub fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: Arc::clone(journal),
            fail_validate: false,
            fail_prepare: false,
            fail_start: false,
            disable_self: false,
            request_shutdown_on_start: false,
            block_until_shutdown: false,
        }
    }

    pub fn fail_validate(mut self) -> Self {
        self.fail_validate = true;
        self
    }

    pub fn fail_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn disable_self(mut self) -> Self {
        self.disable_self = true;
        self
    }

    /// Request shutdown at the end of `start` — stands in for the feature
    /// whose `start` performs the process's useful work.
    pub fn request_shutdown_on_start(mut self) -> Self {
        self.request_shutdown_on_start = true;
        self
    }

    /// Block inside `start` until shutdown is requested.
    pub fn block_until_shutdown(mut self) -> Self {
        self.block_until_shutdown = true;
        self
    }

    fn record(&self, phase: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, phase));
    }
}

#[async_trait]
impl Feature for ProbeFeature {
    fn collect_options(&mut self, _options: &mut ProgramOptions) {
        self.record("collect");
    }

    async fn load_options(&mut self, _options: &mut ProgramOptions) -> Result<()> {
        self.record("load");
        Ok(())
    }

    async fn validate_options(
        &mut self,
        _options: &ProgramOptions,
        ctx: &FeatureContext,
    ) -> Result<()> {
        self.record("validate");
        if self.disable_self {
            ctx.disable(self.name)?;
        }
        if self.fail_validate {
            return Err(Error::Config(format!("{} refuses its options", self.name)));
        }
        Ok(())
    }

    async fn prepare(&mut self, _ctx: &FeatureContext) -> Result<()> {
        self.record("prepare");
        if self.fail_prepare {
            return Err(Error::Config(format!("{} cannot prepare", self.name)));
        }
        Ok(())
    }

    async fn start(&mut self, ctx: &FeatureContext) -> Result<()> {
        self.record("start");
        if self.block_until_shutdown {
            ctx.shutdown_handle().wait().await;
        }
        if self.request_shutdown_on_start {
            ctx.shutdown_handle().begin_shutdown();
        }
        if self.fail_start {
            return Err(Error::Config(format!("{} cannot start", self.name)));
        }
        Ok(())
    }

    async fn stop(&mut self, _ctx: &FeatureContext) -> Result<()> {
        self.record("stop");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Arguments for `run()`: just the program name, no options.
pub fn argv() -> Vec<String> {
    vec!["test".to_string()]
}
