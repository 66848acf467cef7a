//! Configuration and device identity.
//!
//! breeze keeps one small TOML file in the platform configuration
//! directory:
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/breeze/config.toml` |
//! | macOS | `~/Library/Application Support/dev.breeze.Breeze/config.toml` |
//! | Windows | `%APPDATA%\breeze\Breeze\config.toml` |
//!
//! The device id is a UUIDv4 minted on first run and persisted with the
//! rest of the configuration, so it stays stable across restarts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Resolved breeze configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Stable identifier for this device
    pub device_id: Uuid,
    /// Display name announced to the network
    #[serde(default = "default_alias")]
    pub alias: String,
    /// TCP port where this device accepts transfers
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Directory where received files are written
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: Uuid::new_v4(),
            alias: default_alias(),
            listen_port: default_listen_port(),
            download_dir: default_download_dir(),
        }
    }
}

impl Config {
    /// Load the configuration, creating and persisting a fresh one (new
    /// device id, hostname alias, default ports and paths) on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed, or a
    /// fresh one cannot be written.
    pub fn load_or_init() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::read_from(&path)
        } else {
            let config = Self::default();
            config.write_to(&path)?;
            Ok(config)
        }
    }

    /// Save the configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.write_to(&Self::config_path())
    }

    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config: {e}")))
    }

    /// Write the configuration to a specific path, creating parent
    /// directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("failed to create config directory: {e}")))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("failed to write config: {e}")))
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "breeze", "Breeze")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir().map_or_else(|| PathBuf::from("breeze.toml"), |d| d.join("config.toml"))
    }
}

fn default_alias() -> String {
    hostname::get().map_or_else(
        |_| "Breeze Device".to_string(),
        |h| h.to_string_lossy().to_string(),
    )
}

fn default_listen_port() -> u16 {
    crate::DEFAULT_TRANSFER_PORT
}

fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_port, crate::DEFAULT_TRANSFER_PORT);
        assert!(!config.alias.is_empty());
        assert_eq!(config.device_id.get_version_num(), 4);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("config.toml");

        let config = Config::default();
        config.write_to(&path).expect("write");

        let loaded = Config::read_from(&path).expect("read");
        assert_eq!(loaded.device_id, config.device_id);
        assert_eq!(loaded.alias, config.alias);
        assert_eq!(loaded.listen_port, config.listen_port);
        assert_eq!(loaded.download_dir, config.download_dir);
    }

    #[test]
    fn test_partial_file_fills_defaults_but_keeps_identity() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("config.toml");

        let device_id = Uuid::new_v4();
        std::fs::write(&path, format!("device_id = \"{device_id}\"\n")).expect("write");

        let loaded = Config::read_from(&path).expect("read");
        assert_eq!(loaded.device_id, device_id);
        assert_eq!(loaded.listen_port, crate::DEFAULT_TRANSFER_PORT);
    }

    #[test]
    fn test_missing_device_id_is_an_error() {
        // A config without an identity must not silently mint a new one
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "alias = \"nameless\"\n").expect("write");

        let result = Config::read_from(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_garbage_file_is_an_error() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "not toml at all [[[").expect("write");

        let result = Config::read_from(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
