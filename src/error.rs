use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("feature '{0}' is already registered")]
    #[diagnostic(
        code(keel::feature::duplicate),
        help("feature names must be unique across the registry; rename one of the registrations")
    )]
    DuplicateFeature(String),

    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    #[diagnostic(
        code(keel::dependency::cycle),
        help("features cannot start after each other in a cycle; review the starts_after declarations")
    )]
    DependencyCycle(Vec<String>),

    #[error("unknown feature: {0}")]
    #[diagnostic(
        code(keel::feature::unknown),
        help("the feature was never registered; check the name passed to the lookup")
    )]
    UnknownFeature(String),

    #[error("feature '{feature}' does not provide capability '{capability}'")]
    #[diagnostic(code(keel::feature::capability))]
    CapabilityMismatch {
        feature: String,
        capability: &'static str,
    },

    #[error("feature '{feature}' was looked up before it collected its options (state: {state})")]
    #[diagnostic(code(keel::feature::not_ready))]
    FeatureNotReady { feature: String, state: String },

    #[error("feature '{0}' cannot look itself up")]
    SelfLookup(String),

    #[error("invalid options: {0}")]
    #[diagnostic(code(keel::options::invalid))]
    Options(String),

    #[error("feature '{feature}' rejected its configuration: {reason}")]
    #[diagnostic(
        code(keel::feature::validation),
        help("fix the offending option; run with --help to list the declared options")
    )]
    InvalidOptions { feature: String, reason: String },

    #[error("feature '{feature}' failed to prepare: {reason}")]
    #[diagnostic(code(keel::feature::prepare_failed))]
    PrepareFailed { feature: String, reason: String },

    #[error("feature '{feature}' failed to start: {reason}")]
    #[diagnostic(code(keel::feature::start_failed))]
    StartFailed { feature: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::DuplicateFeature(name) => Some(format!(
                "Feature '{}' was registered twice. Each add_feature call needs a unique descriptor name.",
                name
            )),
            Error::DependencyCycle(path) => Some(format!(
                "Break the cycle by removing one of the starts_after edges between: {}",
                path.join(", ")
            )),
            Error::UnknownFeature(name) => Some(format!(
                "'{}' was never registered. A disabled feature is still a valid lookup target; an unregistered one is not.",
                name
            )),
            Error::InvalidOptions { .. } | Error::Options(_) => {
                Some("Run with --help to see the declared options and their defaults.".to_string())
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
