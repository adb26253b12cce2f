use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureContext, FeatureDescriptor};
use crate::features::{ClientFeature, ConfigFeature, ConsoleFeature, LoggerFeature};
use crate::options::{Parameter, ProgramOptions};
use async_trait::async_trait;
use std::any::Any;
use tokio::io::{AsyncBufReadExt, BufReader};

/// The interactive shell. Its `start` runs the process's useful work: it
/// blocks the orchestrating task on the line loop, watches the shutdown
/// handle so an interrupt exits cleanly mid-prompt, and requests shutdown
/// itself when the loop ends — which makes the server's wait phase a no-op.
///
/// With `--shell.execute` the shell runs the given commands and exits
/// instead, silencing the console banner for scriptable output.
#[derive(Debug, Default)]
pub struct ShellFeature {
    execute: Vec<String>,
    interactive: bool,
    client_enabled: bool,
}

impl ShellFeature {
    pub const NAME: &'static str = "shell";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor() -> FeatureDescriptor {
        FeatureDescriptor::new(Self::NAME)
            .starts_after(ConfigFeature::NAME)
            .starts_after(LoggerFeature::NAME)
            .starts_after(ConsoleFeature::NAME)
            .starts_after(ClientFeature::NAME)
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    async fn dispatch(&self, ctx: &FeatureContext, line: &str) -> Result<()> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(());
        };

        match command {
            "help" => {
                print(ctx, "Commands:").await;
                print(ctx, "  help           show this help").await;
                print(ctx, "  echo <text>    print <text>").await;
                print(ctx, "  get <path>     GET <path> on the configured endpoint").await;
                print(ctx, "  quit | exit    leave the shell").await;
                Ok(())
            }
            "echo" => {
                let rest: Vec<&str> = parts.collect();
                print(ctx, &rest.join(" ")).await;
                Ok(())
            }
            "get" => {
                let Some(path) = parts.next() else {
                    return Err(Error::Config("usage: get <path>".to_string()));
                };
                self.get(ctx, path).await
            }
            other => Err(Error::Config(format!("unknown shell command: {}", other))),
        }
    }

    async fn get(&self, ctx: &FeatureContext, path: &str) -> Result<()> {
        if !self.client_enabled {
            print(ctx, "client is disabled (server.endpoint=none)").await;
            return Ok(());
        }

        let (client, url) = ctx
            .with_feature::<ClientFeature, _, _>(ClientFeature::NAME, |client| {
                (client.client().cloned(), client.url_for(path))
            })
            .await?;

        let Some(client) = client else {
            print(ctx, "client is not prepared").await;
            return Ok(());
        };
        let url = url?;

        let response = client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        print(ctx, &format!("HTTP {} from {}", status, url)).await;
        if !body.is_empty() {
            let shown: String = body.chars().take(512).collect();
            if shown.len() < body.len() {
                print(ctx, &format!("{}...", shown)).await;
            } else {
                print(ctx, &shown).await;
            }
        }
        Ok(())
    }
}

/// Print through the console feature so lines land in the audit log; fall
/// back to bare stdout when no console is registered.
async fn print(ctx: &FeatureContext, line: &str) {
    let printed = ctx
        .with_feature::<ConsoleFeature, _, _>(ConsoleFeature::NAME, |console| {
            console.print_line(line);
        })
        .await;
    if printed.is_err() {
        println!("{}", line);
    }
}

#[async_trait]
impl Feature for ShellFeature {
    fn collect_options(&mut self, options: &mut ProgramOptions) {
        options.add_section("shell", "Configure the shell");
        options.add_option(
            "shell.execute",
            "run this command and exit instead of the interactive loop (repeatable)",
            Parameter::StringList,
        );
    }

    async fn validate_options(
        &mut self,
        options: &ProgramOptions,
        ctx: &FeatureContext,
    ) -> Result<()> {
        self.execute = options.strings("shell.execute");
        self.interactive = self.execute.is_empty();
        self.client_enabled = ctx.is_enabled(ClientFeature::NAME).unwrap_or(false);

        if !self.interactive {
            ctx.with_feature_mut::<ConsoleFeature, _, _>(ConsoleFeature::NAME, |console| {
                console.set_quiet(true);
            })
            .await?;
        }

        Ok(())
    }

    async fn start(&mut self, ctx: &FeatureContext) -> Result<()> {
        let shutdown = ctx.shutdown_handle();

        if !self.interactive {
            for command in self.execute.clone() {
                if shutdown.is_shutdown_requested() {
                    break;
                }
                self.dispatch(ctx, &command).await?;
            }
            shutdown.begin_shutdown();
            return Ok(());
        }

        let prompt = ctx
            .with_feature::<ConsoleFeature, _, _>(ConsoleFeature::NAME, |console| {
                console.prompt().to_string()
            })
            .await
            .unwrap_or_else(|_| "> ".to_string());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            if shutdown.is_shutdown_requested() {
                break;
            }
            print!("{}", prompt);
            let _ = std::io::Write::flush(&mut std::io::stdout());

            tokio::select! {
                _ = shutdown.wait() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if matches!(line, "quit" | "exit") {
                            break;
                        }
                        if let Err(e) = self.dispatch(ctx, line).await {
                            print(ctx, &format!("error: {}", e)).await;
                        }
                    }
                    Ok(None) => break, // stdin closed
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read from stdin");
                        break;
                    }
                },
            }
        }

        // Leaving the loop means the process's work is done.
        shutdown.begin_shutdown();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
