//! Engine configuration, read from YAML.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io { path: PathBuf, #[source] source: io::Error },
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub log_level: LevelFilter,
    /// Maximum number of heap objects plus Klasses. Unlimited if absent.
    pub heap_limit: Option<usize>,
    /// Subclasses of `java/lang/Enum` always take the "not initialized" branch.
    pub force_enum_initializers: bool,
    /// A failed class initialization also removes the Klasses it created.
    pub rollback_klasses_on_failure: bool,
    /// Directories searched for class files.
    pub classpath: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            log_level: LevelFilter::Info,
            heap_limit: None,
            force_enum_initializers: true,
            rollback_klasses_on_failure: false,
            classpath: vec![],
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
        EngineConfig::from_yaml_str(&yaml)
    }
}
