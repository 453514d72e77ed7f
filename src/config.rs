// Configuration management for symdex

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Name of the per-directory configuration file
pub const CONFIG_FILE_NAME: &str = ".symdex.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite journal mode. `wal` lets other handles read the last commit
    /// while a transaction is open.
    pub journal_mode: String,
    pub synchronous: String,
    pub busy_timeout_ms: u64,
    pub create_parent_dirs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            journal_mode: "wal".to_string(),
            synchronous: "normal".to_string(),
            busy_timeout_ms: 5000,
            create_parent_dirs: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl WriterConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: WriterConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory.
    /// Looks for .symdex.toml and falls back to defaults.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(CONFIG_FILE_NAME);

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                tracing::debug!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_journal_modes = ["delete", "truncate", "persist", "memory", "wal", "off"];
        if !valid_journal_modes.contains(&self.storage.journal_mode.as_str()) {
            return Err(Error::Config(format!(
                "Invalid journal mode: {}",
                self.storage.journal_mode
            )));
        }

        let valid_synchronous = ["off", "normal", "full", "extra"];
        if !valid_synchronous.contains(&self.storage.synchronous.as_str()) {
            return Err(Error::Config(format!(
                "Invalid synchronous mode: {}",
                self.storage.synchronous
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(Error::Config(format!("Invalid log level: {}", self.logging.level)));
        }
        let valid_formats = ["compact", "pretty", "full"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(Error::Config(format!("Invalid log format: {}", self.logging.format)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = WriterConfig::default();
        assert_eq!(config.storage.journal_mode, "wal");
        assert!(config.storage.create_parent_dirs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[storage]\nsynchronous = \"full\"\n",
        )
        .unwrap();

        let config = WriterConfig::from_dir(dir.path());
        assert_eq!(config.storage.synchronous, "full");
        assert_eq!(config.storage.journal_mode, "wal");
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_missing_or_invalid_file_falls_back() {
        let dir = tempdir().unwrap();
        assert_eq!(WriterConfig::from_dir(dir.path()), WriterConfig::default());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[storage]\njournal_mode = \"sideways\"\n",
        )
        .unwrap();
        assert_eq!(WriterConfig::from_dir(dir.path()), WriterConfig::default());
        assert!(matches!(
            WriterConfig::from_file(dir.path().join(CONFIG_FILE_NAME)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        let mut config = WriterConfig::default();

        config.storage.synchronous = "sometimes".to_string();
        assert!(config.validate().is_err());
        config.storage.synchronous = "normal".to_string();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "info".to_string();

        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
        config.logging.format = "pretty".to_string();

        assert!(config.validate().is_ok());
    }
}
