//! Service configuration.

use std::path::PathBuf;

use anyhow::{Result as AnyhowResult, anyhow};
use serde::{Deserialize, Serialize};

/// Default maximum accepted upload size: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(clap::Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ServiceConfig {
    /// Directory where uploaded archives are stored.
    ///
    /// A single flat directory; archives are addressed by filename with no
    /// subdirectory partitioning and no metadata sidecar files.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "STORAGE_DIR", default_value = "uploads")
    )]
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Maximum accepted size of an uploaded request body in bytes.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)
    )]
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Default storage directory, relative to the working directory.
fn default_storage_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl ServiceConfig {
    /// Validates all configuration values and returns errors for invalid settings.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid:
    /// - Storage directory must not be empty
    /// - Maximum upload size must be non-zero
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(anyhow!("Storage directory cannot be empty"));
        }

        if self.max_upload_bytes == 0 {
            return Err(anyhow!("Maximum upload size must be greater than zero"));
        }

        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn empty_storage_dir_is_rejected() {
        let config = ServiceConfig {
            storage_dir: PathBuf::new(),
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_upload_limit_is_rejected() {
        let config = ServiceConfig {
            max_upload_bytes: 0,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
