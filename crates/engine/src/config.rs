//! Toolbox configuration via `kvtoolbox.toml`
//!
//! Batch ceilings and list page size can be tuned without code changes.
//! Every field is optional; missing fields take the defaults, which sit
//! below the store's native limits to absorb size estimation error.

use serde::{Deserialize, Serialize};
use std::path::Path;

use kvtoolbox_core::{BatchLimits, Error, Result};

use crate::batched_atomic::BatchedAtomicOptions;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "kvtoolbox.toml";

/// Toolbox configuration loaded from `kvtoolbox.toml`.
///
/// # Example
///
/// ```toml
/// max_checks = 99
/// max_mutations = 999
/// max_bytes = 750000
/// max_key_bytes = 75000
/// # batch_size = 100
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolboxConfig {
    /// Batch ceilings, flattened into the top-level table
    #[serde(flatten)]
    pub limits: BatchLimits,
    /// Page size for chunk and key listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

impl ToolboxConfig {
    /// Check every ceiling and the page size are non-zero.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` naming the first zero field.
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        if self.batch_size == Some(0) {
            return Err(Error::Configuration(
                "batch_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Options for a batched atomic operation built from this config.
    pub fn batch_options(&self) -> BatchedAtomicOptions {
        BatchedAtomicOptions {
            limits: self.limits,
            batch_size: self.batch_size,
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# kvtoolbox configuration
#
# Ceilings for each native commit issued by a batched atomic operation.
# Keep them below the store's own limits: sizes are estimates.
max_checks = 99
max_mutations = 999
max_bytes = 750000
max_key_bytes = 75000

# Entries fetched per page when listing blob chunks and keys.
# batch_size = 100
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ToolboxConfig = toml::from_str(&content).map_err(|e| {
            Error::Configuration(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Configuration(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Configuration(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_batch_defaults() {
        let config = ToolboxConfig::default();
        assert_eq!(config.limits, BatchLimits::default());
        assert_eq!(config.batch_options(), BatchedAtomicOptions::default());
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config: ToolboxConfig = toml::from_str(ToolboxConfig::default_toml()).unwrap();
        assert_eq!(config, ToolboxConfig::default());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: ToolboxConfig = toml::from_str("max_mutations = 10\nbatch_size = 5").unwrap();
        assert_eq!(config.limits.max_mutations, 10);
        assert_eq!(config.limits.max_checks, 99);
        assert_eq!(config.batch_size, Some(5));
    }

    #[test]
    fn zero_ceiling_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_bytes = 0\n").unwrap();
        assert!(matches!(
            ToolboxConfig::from_file(&path),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn zero_batch_size_rejected() {
        let config = ToolboxConfig {
            batch_size: Some(0),
            ..ToolboxConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        ToolboxConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        assert_eq!(ToolboxConfig::from_file(&path).unwrap(), ToolboxConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_checks = 7\n").unwrap();

        ToolboxConfig::write_default_if_missing(&path).unwrap();
        assert_eq!(ToolboxConfig::from_file(&path).unwrap().limits.max_checks, 7);
    }

    #[test]
    fn missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(ToolboxConfig::from_file(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = ToolboxConfig {
            limits: BatchLimits {
                max_checks: 5,
                max_mutations: 50,
                max_bytes: 5_000,
                max_key_bytes: 500,
            },
            batch_size: Some(25),
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(ToolboxConfig::from_file(&path).unwrap(), config);
    }
}
