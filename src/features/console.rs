use crate::error::Result;
use crate::feature::{Feature, FeatureContext, FeatureDescriptor};
use crate::features::LoggerFeature;
use crate::options::{Parameter, ProgramOptions};
use async_trait::async_trait;
use std::any::Any;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Terminal output: prompt, quiet mode, and the optional audit log that
/// records everything printed. The audit file is opened in `prepare` (a
/// resource acquired for later writing, no output yet) and flushed/closed in
/// `stop`.
#[derive(Debug, Default)]
pub struct ConsoleFeature {
    quiet: bool,
    colors: bool,
    pretty_print: bool,
    pager: bool,
    pager_command: String,
    prompt: String,
    audit_file: Option<PathBuf>,
    audit: parking_lot::Mutex<Option<BufWriter<File>>>,
}

impl ConsoleFeature {
    pub const NAME: &'static str = "console";

    pub fn new() -> Self {
        Self {
            colors: true,
            pretty_print: true,
            pager_command: "less -X -R -F -L".to_string(),
            prompt: "> ".to_string(),
            ..Self::default()
        }
    }

    pub fn descriptor() -> FeatureDescriptor {
        FeatureDescriptor::new(Self::NAME).starts_after(LoggerFeature::NAME)
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Silence banner and non-essential output. Siblings use this for batch
    /// runs.
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    pub fn use_colors(&self) -> bool {
        self.colors
    }

    pub fn pretty_print(&self) -> bool {
        self.pretty_print
    }

    pub fn use_pager(&self) -> bool {
        self.pager
    }

    pub fn pager_command(&self) -> &str {
        &self.pager_command
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Print a line to stdout and mirror it into the audit log.
    pub fn print_line(&self, line: &str) {
        println!("{}", line);
        self.audit_line(line);
    }

    /// Append a timestamped line to the audit log, if one is configured.
    pub fn audit_line(&self, line: &str) {
        let mut guard = self.audit.lock();
        if let Some(writer) = guard.as_mut() {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            if let Err(e) = writeln!(writer, "[{}] {}", timestamp, line) {
                tracing::warn!(error = %e, "failed to write audit log entry");
            }
        }
    }
}

#[async_trait]
impl Feature for ConsoleFeature {
    fn collect_options(&mut self, options: &mut ProgramOptions) {
        options.add_section("console", "Configure the console");

        options.add_option(
            "console.quiet",
            "silent startup",
            Parameter::Flag { default: false },
        );
        options.add_option(
            "console.colors",
            "enable color support",
            Parameter::Flag { default: true },
        );
        options.add_option(
            "console.pretty-print",
            "enable pretty printing",
            Parameter::Flag { default: true },
        );
        options.add_option(
            "console.pager",
            "enable paging of long output",
            Parameter::Flag { default: false },
        );
        options.add_option(
            "console.pager-command",
            "pager command",
            Parameter::String {
                default: Some("less -X -R -F -L".to_string()),
            },
        );
        options.add_option(
            "console.prompt",
            "prompt used in the interactive shell",
            Parameter::String {
                default: Some("> ".to_string()),
            },
        );
        options.add_option(
            "console.audit-file",
            "audit log file recording commands and results",
            Parameter::String { default: None },
        );
    }

    async fn validate_options(
        &mut self,
        options: &ProgramOptions,
        _ctx: &FeatureContext,
    ) -> Result<()> {
        self.quiet = options.flag("console.quiet");
        self.colors = options.flag("console.colors");
        self.pretty_print = options.flag("console.pretty-print");
        self.pager = options.flag("console.pager");
        if let Some(cmd) = options.string("console.pager-command") {
            self.pager_command = cmd;
        }
        if let Some(prompt) = options.string("console.prompt") {
            self.prompt = prompt;
        }
        self.audit_file = options.string("console.audit-file").map(PathBuf::from);
        Ok(())
    }

    async fn prepare(&mut self, _ctx: &FeatureContext) -> Result<()> {
        if let Some(path) = &self.audit_file {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            *self.audit.lock() = Some(BufWriter::new(file));
            tracing::debug!(file = %path.display(), "opened console audit log");
        }
        Ok(())
    }

    async fn start(&mut self, _ctx: &FeatureContext) -> Result<()> {
        if !self.quiet {
            self.print_line("Type 'help' for help, 'quit' to exit.");
        }
        Ok(())
    }

    async fn stop(&mut self, _ctx: &FeatureContext) -> Result<()> {
        // take() makes repeated stops a no-op
        if let Some(mut writer) = self.audit.lock().take() {
            if let Err(e) = writer.flush() {
                tracing::warn!(error = %e, "failed to flush audit log");
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
