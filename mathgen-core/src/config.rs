//! Generator Configuration
//!
//! Loaded from an optional JSON file; every field has a default so an empty
//! object is a valid configuration. CLI flags override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pipeline::{EmitOptions, FailurePolicy};
use crate::validation::BuildMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Built-in templates when unset.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    /// Built-in schema when unset.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,
    #[serde(default)]
    pub mode: BuildMode,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Render threads; 0 uses every core.
    #[serde(default)]
    pub jobs: usize,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            templates_dir: None,
            schema_path: None,
            mode: BuildMode::default(),
            failure_policy: FailurePolicy::default(),
            jobs: 0,
            dry_run: false,
        }
    }
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("outputDir cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            output_dir: self.output_dir.clone(),
            mode: self.mode,
            failure_policy: self.failure_policy,
            jobs: self.jobs,
            dry_run: self.dry_run,
        }
    }
}
