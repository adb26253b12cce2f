use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureContext, FeatureDescriptor};
use crate::features::{ConfigFeature, LoggerFeature};
use crate::options::{Parameter, ProgramOptions};
use async_trait::async_trait;
use std::any::Any;
use std::time::Duration;

/// Connection configuration plus the lazily constructed HTTP client.
///
/// `prepare` only builds the client — no connection is opened until a
/// sibling actually issues a request, which keeps the phase free of
/// observable side effects. Setting `server.endpoint=none` disables the
/// feature during validation; it stays registered (and can still be looked
/// up), it just never prepares or starts.
#[derive(Debug)]
pub struct ClientFeature {
    endpoint: String,
    username: String,
    password: String,
    database: String,
    authentication: bool,
    connect_timeout: Duration,
    request_timeout: Duration,
    retries: u64,
    client: Option<reqwest::Client>,
}

impl ClientFeature {
    pub const NAME: &'static str = "client";

    pub const DEFAULT_ENDPOINT: &'static str = "http://127.0.0.1:8080";
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
    pub const DEFAULT_RETRIES: u64 = 2;

    pub fn new() -> Self {
        Self {
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            username: "root".to_string(),
            password: String::new(),
            database: "default".to_string(),
            authentication: true,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            retries: Self::DEFAULT_RETRIES,
            client: None,
        }
    }

    pub fn descriptor() -> FeatureDescriptor {
        FeatureDescriptor::new(Self::NAME)
            .starts_after(ConfigFeature::NAME)
            .starts_after(LoggerFeature::NAME)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn use_authentication(&self) -> bool {
        self.authentication
    }

    pub fn retries(&self) -> u64 {
        self.retries
    }

    /// The HTTP client, available from `prepare` until `stop`.
    pub fn client(&self) -> Option<&reqwest::Client> {
        self.client.as_ref()
    }

    /// Resolve a request path against the configured endpoint.
    pub fn url_for(&self, path: &str) -> Result<reqwest::Url> {
        let base = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| Error::Options(format!("invalid server endpoint '{}': {}", self.endpoint, e)))?;
        base.join(path)
            .map_err(|e| Error::Options(format!("invalid request path '{}': {}", path, e)))
    }
}

impl Default for ClientFeature {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Feature for ClientFeature {
    fn collect_options(&mut self, options: &mut ProgramOptions) {
        options.add_section("server", "Configure the server connection");

        options.add_option(
            "server.endpoint",
            "endpoint to connect to, or 'none' to run without a connection",
            Parameter::String {
                default: Some(Self::DEFAULT_ENDPOINT.to_string()),
            },
        );
        options.add_option(
            "server.username",
            "username to use when connecting",
            Parameter::String {
                default: Some("root".to_string()),
            },
        );
        options.add_option(
            "server.password",
            "password to use when connecting",
            Parameter::String {
                default: Some(String::new()),
            },
        );
        options.add_option(
            "server.database",
            "database to use when connecting",
            Parameter::String {
                default: Some("default".to_string()),
            },
        );
        options.add_option(
            "server.authentication",
            "require authentication when connecting",
            Parameter::Flag { default: true },
        );
        options.add_option(
            "server.connect-timeout",
            "connect timeout in seconds",
            Parameter::Uint {
                default: Some(Self::DEFAULT_CONNECT_TIMEOUT.as_secs()),
            },
        );
        options.add_option(
            "server.request-timeout",
            "request timeout in seconds",
            Parameter::Uint {
                default: Some(Self::DEFAULT_REQUEST_TIMEOUT.as_secs()),
            },
        );
        options.add_option(
            "server.retries",
            "number of connection retries",
            Parameter::Uint {
                default: Some(Self::DEFAULT_RETRIES),
            },
        );
    }

    async fn validate_options(
        &mut self,
        options: &ProgramOptions,
        ctx: &FeatureContext,
    ) -> Result<()> {
        self.endpoint = options
            .string("server.endpoint")
            .unwrap_or_else(|| Self::DEFAULT_ENDPOINT.to_string());
        self.username = options.string("server.username").unwrap_or_default();
        self.password = options.string("server.password").unwrap_or_default();
        self.database = options
            .string("server.database")
            .unwrap_or_else(|| "default".to_string());
        self.authentication = options.flag("server.authentication");
        if let Some(secs) = options.uint("server.connect-timeout") {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = options.uint("server.request-timeout") {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = options.uint("server.retries") {
            self.retries = retries;
        }

        if self.endpoint == "none" {
            tracing::debug!("server endpoint set to 'none'; disabling the client");
            ctx.disable(Self::NAME)?;
            return Ok(());
        }

        let url = reqwest::Url::parse(&self.endpoint).map_err(|e| {
            Error::Options(format!("invalid server endpoint '{}': {}", self.endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Options(format!(
                "unsupported endpoint scheme '{}'; expected http or https",
                url.scheme()
            )));
        }

        Ok(())
    }

    async fn prepare(&mut self, _ctx: &FeatureContext) -> Result<()> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()?;
        self.client = Some(client);
        Ok(())
    }

    async fn stop(&mut self, _ctx: &FeatureContext) -> Result<()> {
        self.client = None;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
