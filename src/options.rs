//! Declared configuration slots and their command-line realization.
//!
//! Features declare named, typed options during `collect_options`; after all
//! declarations are in, [`ProgramOptions::parse`] materializes them as a
//! `clap` command (`--section.name` long options) and parses the process
//! arguments once. Values resolve with the precedence
//! command line > config-file override > declared default.

use crate::error::{Error, Result};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::{HashMap, HashSet};

/// A typed configuration slot declared by a feature.
#[derive(Debug, Clone)]
pub enum Parameter {
    /// Boolean option; `--key` means true, `--key=false` overrides.
    Flag { default: bool },
    /// Single string value.
    String { default: Option<String> },
    /// Unsigned integer value.
    Uint { default: Option<u64> },
    /// Repeatable string value.
    StringList,
}

#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub key: String,
    pub help: String,
    pub parameter: Parameter,
}

#[derive(Debug, Clone)]
struct Section {
    name: String,
    description: String,
    options: Vec<OptionSpec>,
}

/// Outcome of parsing the process arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Options parsed; phase driving continues.
    Parsed,
    /// `--help` or `--version` was printed; the process should exit cleanly.
    Exited,
}

/// The collected option declarations plus, after [`parse`](Self::parse),
/// their resolved values.
#[derive(Debug)]
pub struct ProgramOptions {
    name: String,
    about: String,
    version: String,
    sections: Vec<Section>,
    section_index: HashMap<String, usize>,
    matches: Option<ArgMatches>,
    /// Config-file values, weaker than explicit command-line values.
    overrides: HashMap<String, Vec<String>>,
}

impl ProgramOptions {
    pub fn new(
        name: impl Into<String>,
        about: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            version: version.into(),
            sections: Vec::new(),
            section_index: HashMap::new(),
            matches: None,
            overrides: HashMap::new(),
        }
    }

    /// Declare a section; repeated declarations keep the first description.
    pub fn add_section(&mut self, name: &str, description: &str) {
        if self.section_index.contains_key(name) {
            return;
        }
        self.section_index.insert(name.to_string(), self.sections.len());
        self.sections.push(Section {
            name: name.to_string(),
            description: description.to_string(),
            options: Vec::new(),
        });
    }

    /// Declare one option. The key is `section.name`; the section is created
    /// on demand. Declaration never fails — collisions are reported once, at
    /// parse time.
    pub fn add_option(&mut self, key: &str, help: &str, parameter: Parameter) {
        let section_name = key.split('.').next().unwrap_or(key).to_string();
        self.add_section(&section_name, "");
        let idx = self.section_index[&section_name];
        self.sections[idx].options.push(OptionSpec {
            key: key.to_string(),
            help: help.to_string(),
            parameter,
        });
    }

    fn spec(&self, key: &str) -> Option<&OptionSpec> {
        self.sections
            .iter()
            .flat_map(|s| s.options.iter())
            .find(|o| o.key == key)
    }

    /// Build the command and parse the process arguments (`args[0]` is the
    /// program name). Returns [`ParseOutcome::Exited`] after printing help or
    /// the version.
    pub fn parse(&mut self, args: &[String]) -> Result<ParseOutcome> {
        let mut seen = HashSet::new();
        for section in &self.sections {
            for opt in &section.options {
                if !seen.insert(opt.key.clone()) {
                    return Err(Error::Options(format!(
                        "option '{}' declared more than once",
                        opt.key
                    )));
                }
            }
        }

        let mut cmd = Command::new(self.name.clone())
            .about(self.about.clone())
            .version(self.version.clone());

        for section in &self.sections {
            let heading = if section.description.is_empty() {
                section.name.clone()
            } else {
                format!("{} ({})", section.description, section.name)
            };
            for opt in &section.options {
                let mut arg = Arg::new(opt.key.clone())
                    .long(opt.key.clone())
                    .help(opt.help.clone())
                    .help_heading(heading.clone());

                arg = match &opt.parameter {
                    Parameter::Flag { default } => arg
                        .num_args(0..=1)
                        .action(ArgAction::Set)
                        .value_parser(clap::value_parser!(bool))
                        .default_value(if *default { "true" } else { "false" })
                        .default_missing_value("true"),
                    Parameter::String { default } => {
                        let mut a = arg
                            .num_args(1)
                            .action(ArgAction::Set)
                            .value_parser(clap::value_parser!(String));
                        if let Some(d) = default {
                            a = a.default_value(d.clone());
                        }
                        a
                    }
                    Parameter::Uint { default } => {
                        let mut a = arg
                            .num_args(1)
                            .action(ArgAction::Set)
                            .value_parser(clap::value_parser!(u64));
                        if let Some(d) = default {
                            a = a.default_value(d.to_string());
                        }
                        a
                    }
                    Parameter::StringList => arg
                        .num_args(1)
                        .action(ArgAction::Append)
                        .value_parser(clap::value_parser!(String)),
                };

                cmd = cmd.arg(arg);
            }
        }

        match cmd.try_get_matches_from(args) {
            Ok(matches) => {
                self.matches = Some(matches);
                Ok(ParseOutcome::Parsed)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
                ) =>
            {
                e.print()?;
                Ok(ParseOutcome::Exited)
            }
            Err(e) => Err(Error::Options(e.to_string())),
        }
    }

    /// Apply a config-file value beneath any explicit command-line value.
    /// Unknown keys and type mismatches are rejected so typos in config
    /// files surface instead of silently doing nothing.
    pub fn set_override(&mut self, key: &str, values: Vec<String>) -> Result<()> {
        let spec = self
            .spec(key)
            .ok_or_else(|| Error::Options(format!("unknown option '{}' in config file", key)))?;

        match &spec.parameter {
            Parameter::Flag { .. } => {
                for v in &values {
                    if !matches!(v.trim(), "true" | "false" | "1" | "0" | "yes" | "no" | "on" | "off")
                    {
                        return Err(Error::Options(format!(
                            "option '{}' expects a boolean, got '{}'",
                            key, v
                        )));
                    }
                }
            }
            Parameter::Uint { .. } => {
                for v in &values {
                    v.trim().parse::<u64>().map_err(|_| {
                        Error::Options(format!(
                            "option '{}' expects an unsigned integer, got '{}'",
                            key, v
                        ))
                    })?;
                }
            }
            Parameter::String { .. } | Parameter::StringList => {}
        }

        self.overrides.insert(key.to_string(), values);
        Ok(())
    }

    fn is_cli_set(&self, key: &str) -> bool {
        self.matches
            .as_ref()
            .and_then(|m| m.value_source(key))
            .map(|s| s == ValueSource::CommandLine)
            .unwrap_or(false)
    }

    fn override_value(&self, key: &str) -> Option<&str> {
        if self.is_cli_set(key) {
            return None;
        }
        self.overrides
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        if let Some(v) = self.override_value(key) {
            return matches!(v.trim(), "true" | "1" | "yes" | "on");
        }
        self.matches
            .as_ref()
            .and_then(|m| m.get_one::<bool>(key).copied())
            .unwrap_or(false)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        if let Some(v) = self.override_value(key) {
            return Some(v.to_string());
        }
        self.matches
            .as_ref()
            .and_then(|m| m.get_one::<String>(key).cloned())
    }

    pub fn uint(&self, key: &str) -> Option<u64> {
        if let Some(v) = self.override_value(key) {
            return v.trim().parse().ok();
        }
        self.matches
            .as_ref()
            .and_then(|m| m.get_one::<u64>(key).copied())
    }

    pub fn strings(&self, key: &str) -> Vec<String> {
        if !self.is_cli_set(key) {
            if let Some(values) = self.overrides.get(key) {
                return values.clone();
            }
        }
        self.matches
            .as_ref()
            .and_then(|m| m.get_many::<String>(key))
            .map(|v| v.cloned().collect())
            .unwrap_or_default()
    }
}
