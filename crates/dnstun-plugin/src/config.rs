//! Detector configuration

use dnstun_classifiers::{ModelConfigSpec, DEFAULT_BLOCKED_CLASS, DEFAULT_SEQUENCE_LENGTH};
use dnstun_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-query inference budget
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Detector configuration, read from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnstunConfig {
    /// Model file and endpoints
    pub model: ModelConfigSpec,

    /// Encoded sequence length the model was trained with
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,

    /// Class index that triggers a refusal
    #[serde(default = "default_blocked_class")]
    pub blocked_class: usize,

    /// Inference budget per query, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl DnstunConfig {
    /// Configuration for a graph file with every other setting at its default
    pub fn new(graph: impl Into<PathBuf>) -> Self {
        Self {
            model: ModelConfigSpec::new(graph),
            sequence_length: default_sequence_length(),
            blocked_class: default_blocked_class(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file; a relative graph path is taken relative to the file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_yaml(&content)?;
        if let Some(dir) = path.parent() {
            config.model.resolve_relative_to(dir);
        }

        tracing::debug!(
            path = %path.display(),
            graph = %config.model.graph.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.model.graph.as_os_str().is_empty() {
            return Err(Error::config("model.graph must not be empty"));
        }
        if self.sequence_length == 0 {
            return Err(Error::config("sequence_length must be positive"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("timeout_ms must be positive"));
        }
        if self.model.num_classes == Some(0) {
            return Err(Error::config("model.num_classes must be positive"));
        }
        if self.model.max_concurrency == 0 {
            return Err(Error::config("model.max_concurrency must be positive"));
        }
        Ok(())
    }

    /// Per-query inference budget
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_sequence_length() -> usize {
    DEFAULT_SEQUENCE_LENGTH
}

fn default_blocked_class() -> usize {
    DEFAULT_BLOCKED_CLASS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
