use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureDescriptor};
use crate::options::{Parameter, ProgramOptions};
use async_trait::async_trait;
use std::any::Any;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Establishes global logging before any other feature validates, so that
/// every later warning is captured. Runs its setup in `load_options`, not
/// `prepare` — the one feature whose configuration must take effect eagerly.
#[derive(Debug, Default)]
pub struct LoggerFeature {
    level: String,
    file: Option<PathBuf>,
    line_numbers: bool,
    thread_ids: bool,
}

impl LoggerFeature {
    pub const NAME: &'static str = "logging";

    pub fn new() -> Self {
        Self {
            level: "info".to_string(),
            ..Self::default()
        }
    }

    pub fn descriptor() -> FeatureDescriptor {
        FeatureDescriptor::new(Self::NAME)
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    fn install_subscriber(&self) -> Result<()> {
        // RUST_LOG wins over --log.level, like any tracing-based tool.
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| {
                Error::Options(format!("invalid log level '{}': {}", self.level, e))
            })?,
        };

        let installed = if let Some(path) = &self.file {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_file(self.line_numbers)
                .with_line_number(self.line_numbers)
                .with_thread_ids(self.thread_ids)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_file(self.line_numbers)
                .with_line_number(self.line_numbers)
                .with_thread_ids(self.thread_ids)
                .try_init()
        };

        if installed.is_err() {
            // A subscriber already exists (embedding application or tests);
            // keep it rather than failing the whole process.
            tracing::debug!("global subscriber already installed; keeping the existing logger");
        }

        Ok(())
    }
}

#[async_trait]
impl Feature for LoggerFeature {
    fn collect_options(&mut self, options: &mut ProgramOptions) {
        options.add_section("log", "Configure the logging");

        options.add_option(
            "log.level",
            "the global log level, or a full filter directive",
            Parameter::String {
                default: Some("info".to_string()),
            },
        );
        options.add_option(
            "log.file",
            "write log output to this file instead of stderr",
            Parameter::String { default: None },
        );
        options.add_option(
            "log.line-number",
            "append file name and line number",
            Parameter::Flag { default: false },
        );
        options.add_option(
            "log.thread",
            "append a thread identifier",
            Parameter::Flag { default: false },
        );
    }

    async fn load_options(&mut self, options: &mut ProgramOptions) -> Result<()> {
        self.level = options
            .string("log.level")
            .unwrap_or_else(|| "info".to_string());
        self.file = options.string("log.file").map(PathBuf::from);
        self.line_numbers = options.flag("log.line-number");
        self.thread_ids = options.flag("log.thread");

        self.install_subscriber()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parsed(args: &[&str]) -> ProgramOptions {
        let mut options = ProgramOptions::new("test", "", "0.0.0");
        let mut feature = LoggerFeature::new();
        feature.collect_options(&mut options);
        let argv: Vec<String> = std::iter::once("test")
            .chain(args.iter().copied())
            .map(String::from)
            .collect();
        options.parse(&argv).unwrap();
        options
    }

    #[tokio::test]
    #[serial]
    async fn load_applies_parsed_level() {
        let mut options = parsed(&["--log.level", "debug", "--log.thread"]);
        let mut feature = LoggerFeature::new();
        feature.load_options(&mut options).await.unwrap();
        assert_eq!(feature.level(), "debug");
        assert!(feature.thread_ids);
    }

    #[tokio::test]
    #[serial]
    async fn invalid_level_is_rejected() {
        // RUST_LOG would shadow --log.level entirely
        std::env::remove_var("RUST_LOG");
        let mut options = parsed(&["--log.level", "foo=bar"]);
        let mut feature = LoggerFeature::new();
        let err = feature.load_options(&mut options).await.unwrap_err();
        assert!(matches!(err, Error::Options(_)));
    }
}
