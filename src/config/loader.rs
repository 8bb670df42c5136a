//! Configuration Loader
//!
//! Layers client settings from defaults, config files and the environment.

use crate::config::client::{ClientConfig, ConfigOverlay};
use crate::error::{MistralError, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "MISTRAL_CONFIG_PATH";

/// Configuration loader with support for multiple sources
///
/// Later sources override earlier ones field by field: built-in defaults,
/// then config files, then `MISTRAL_API_KEY` / `MISTRAL_BASE_URL`.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: ClientConfig,
}

impl ConfigLoader {
    /// Create a new config loader and load from default locations
    pub fn new() -> Result<Self> {
        let mut loader = Self::default();

        for path in Self::get_config_paths() {
            if path.exists() {
                loader.load_from_file(&path)?;
            }
        }

        loader.load_from_env();
        Ok(loader)
    }

    /// Create a loader with a specific config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self::default();
        loader.load_from_file(path)?;
        loader.load_from_env();
        Ok(loader)
    }

    /// Get list of config paths to check, lowest precedence first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".mistral").join("config.json"));
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("mistral").join("config.json"));
        }

        paths.push(PathBuf::from("mistral.json"));

        if let Ok(custom_path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    /// Load configuration from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MistralError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let overlay: ConfigOverlay = serde_json::from_str(&content).map_err(|e| {
            MistralError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), "loaded client config");
        self.config.merge(overlay);
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.config.merge(ConfigOverlay::from_env());
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Take ownership of the configuration
    pub fn into_config(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_custom_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "base_url": "https://custom.api.com/v1",
                "timeout_secs": 30
            }}"#
        )
        .unwrap();

        let loader = ConfigLoader::from_path(file.path()).unwrap();
        let config = loader.config();
        // Unless overridden by the environment running the tests
        if std::env::var(crate::config::BASE_URL_ENV).is_err() {
            assert_eq!(config.base_url, "https://custom.api.com/v1");
        }
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();

        let err = ConfigLoader::from_path(file.path()).unwrap_err();
        assert!(matches!(err, MistralError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::from_path(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, MistralError::Config(msg) if msg.contains("absent.json")));
    }

    #[test]
    fn test_later_files_override_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        std::fs::write(&first, r#"{"timeout_secs": 1, "connect_timeout_secs": 2}"#).unwrap();
        std::fs::write(&second, r#"{"timeout_secs": 3}"#).unwrap();

        let mut loader = ConfigLoader::default();
        loader.load_from_file(&first).unwrap();
        loader.load_from_file(&second).unwrap();

        assert_eq!(loader.config().timeout_secs, 3);
        assert_eq!(loader.config().connect_timeout_secs, 2);
    }
}
