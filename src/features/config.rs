use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureDescriptor};
use crate::features::LoggerFeature;
use crate::options::{Parameter, ProgramOptions};
use async_trait::async_trait;
use std::any::Any;
use std::path::{Path, PathBuf};

/// Applies a YAML configuration file beneath explicit command-line values.
///
/// Runs in `load_options`, before anyone validates, so every feature sees
/// the merged result. The file holds `section: {option: value}` mappings
/// matching the declared option keys.
#[derive(Debug, Default)]
pub struct ConfigFeature {
    path: Option<PathBuf>,
}

impl ConfigFeature {
    pub const NAME: &'static str = "config";

    /// File name searched for upward from the working directory when no
    /// explicit path is given.
    pub const DEFAULT_FILE: &'static str = "keelsh.yaml";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor() -> FeatureDescriptor {
        FeatureDescriptor::new(Self::NAME).starts_after(LoggerFeature::NAME)
    }

    /// The file that was applied, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn find_default_file() -> Option<PathBuf> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let candidate = dir.join(Self::DEFAULT_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    fn apply_file(path: &Path, options: &mut ProgramOptions) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&content)?;

        if !matches!(doc, serde_yaml::Value::Mapping(_)) {
            return Err(Error::Config(format!(
                "config file '{}' must contain a mapping of sections",
                path.display()
            )));
        }

        let mut entries = Vec::new();
        flatten("", &doc, &mut entries)?;
        for (key, values) in entries {
            options.set_override(&key, values)?;
        }
        Ok(())
    }
}

/// Flatten nested mappings into dotted option keys; sequences become
/// repeated values, nulls are skipped.
fn flatten(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut Vec<(String, Vec<String>)>,
) -> Result<()> {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, child) in map {
                let name = key.as_str().ok_or_else(|| {
                    Error::Config(format!("non-string key under '{}' in config file", prefix))
                })?;
                let key = if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{}.{}", prefix, name)
                };
                flatten(&key, child, out)?;
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            let mut values = Vec::with_capacity(seq.len());
            for item in seq {
                match scalar_to_string(item) {
                    Some(v) => values.push(v),
                    None => {
                        return Err(Error::Config(format!(
                            "option '{}' has a non-scalar list entry",
                            prefix
                        )))
                    }
                }
            }
            out.push((prefix.to_string(), values));
        }
        serde_yaml::Value::Null => {}
        other => match scalar_to_string(other) {
            Some(v) => out.push((prefix.to_string(), vec![v])),
            None => {
                return Err(Error::Config(format!(
                    "option '{}' has an unsupported value type",
                    prefix
                )))
            }
        },
    }
    Ok(())
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Feature for ConfigFeature {
    fn collect_options(&mut self, options: &mut ProgramOptions) {
        options.add_section("config", "Configuration file handling");
        options.add_option(
            "config.file",
            "read options from this YAML file",
            Parameter::String { default: None },
        );
    }

    async fn load_options(&mut self, options: &mut ProgramOptions) -> Result<()> {
        let path = match options.string("config.file") {
            Some(explicit) => {
                let path = PathBuf::from(explicit);
                if !path.exists() {
                    // An explicitly named file must exist; a missing default
                    // search result is simply "no config".
                    return Err(Error::Config(format!(
                        "config file '{}' not found",
                        path.display()
                    )));
                }
                Some(path)
            }
            None => Self::find_default_file(),
        };

        if let Some(path) = &path {
            Self::apply_file(path, options)?;
            tracing::debug!(file = %path.display(), "applied configuration file");
        }

        self.path = path;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
