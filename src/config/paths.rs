//! Path management for Hearth
//!
//! Resolves where the vault config, settings, and the household store live.
//!
//! ## Path Resolution Order
//!
//! 1. `HEARTH_DATA_DIR` environment variable (if set)
//! 2. The platform config directory from `directories::ProjectDirs`
//!    (`~/.config/hearth` on Linux, `%APPDATA%\hearth` on Windows)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::HearthError;

/// Environment variable overriding the base directory
pub const DATA_DIR_ENV: &str = "HEARTH_DATA_DIR";

/// Manages all paths used by Hearth
#[derive(Debug, Clone)]
pub struct HearthPaths {
    /// Base directory for all Hearth data
    base_dir: PathBuf,
}

impl HearthPaths {
    /// Create a new HearthPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home/config directory can be determined.
    pub fn new() -> Result<Self, HearthError> {
        let base_dir = if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create HearthPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory holding the household store
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the vault config (absent until the vault is enabled)
    pub fn vault_config_file(&self) -> PathBuf {
        self.base_dir.join("vault.json")
    }

    /// Get the path to the plaintext household store
    pub fn store_file(&self) -> PathBuf {
        self.data_dir().join("household.json")
    }

    /// Get the path to the encrypted store envelope (`<store>.enc`)
    pub fn envelope_file(&self) -> PathBuf {
        self.data_dir().join("household.json.enc")
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<(), HearthError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| HearthError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| HearthError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }

    /// Check if Hearth has been initialized (settings file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

/// Resolve the default base directory for this platform
fn resolve_default_path() -> Result<PathBuf, HearthError> {
    ProjectDirs::from("", "", "hearth")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| HearthError::Config("Could not determine a home directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HearthPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
    }

    #[test]
    fn test_envelope_is_sibling_of_store() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HearthPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.store_file().parent(), paths.envelope_file().parent());
        assert_eq!(
            paths.envelope_file().file_name().unwrap(),
            "household.json.enc"
        );
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HearthPaths::with_base_dir(temp_dir.path().join("nested"));

        paths.ensure_directories().unwrap();

        assert!(paths.data_dir().exists());
        assert!(!paths.is_initialized());
    }
}
