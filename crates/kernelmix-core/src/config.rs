//! Mixing layer configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! is a valid configuration:
//!
//! ```toml
//! local_suffix = " (Local)"
//! remote_suffix = " (Remote)"
//! default_kernel_name = "python3"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_KERNEL_NAME_ENV, DEFAULT_LOCAL_SUFFIX, DEFAULT_REMOTE_SUFFIX};

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for the mixing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Appended to the display name of every local kernel type.
    pub local_suffix: String,
    /// Appended to the display name of every remote kernel type.
    pub remote_suffix: String,
    /// Kernel type offered as the default. Falls back to the first local type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_kernel_name: Option<String>,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            local_suffix: DEFAULT_LOCAL_SUFFIX.to_string(),
            remote_suffix: DEFAULT_REMOTE_SUFFIX.to_string(),
            default_kernel_name: None,
        }
    }
}

impl MixConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Set the default kernel type.
    pub fn with_default_kernel_name(mut self, name: impl Into<String>) -> Self {
        self.default_kernel_name = Some(name.into());
        self
    }

    /// Set both display suffixes.
    pub fn with_suffixes(mut self, local: impl Into<String>, remote: impl Into<String>) -> Self {
        self.local_suffix = local.into();
        self.remote_suffix = remote.into();
        self
    }

    /// Default kernel type: environment override first, then the configured value.
    pub fn resolve_default_kernel_name(&self) -> Option<String> {
        std::env::var(DEFAULT_KERNEL_NAME_ENV)
            .ok()
            .filter(|name| !name.is_empty())
            .or_else(|| self.default_kernel_name.clone())
    }
}
