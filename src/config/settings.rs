//! User settings for Hearth
//!
//! Installation-wide preferences: the trusted UI origin, key-derivation cost
//! for new installations, auto-lock default, and logging level.

use serde::{Deserialize, Serialize};

use super::paths::HearthPaths;
use crate::crypto::kdf::DEFAULT_ITERATIONS;
use crate::crypto::password::MemberHashParams;
use crate::error::HearthError;
use crate::storage::file_io::write_json_atomic;

/// Settings for Hearth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Origin string the trusted UI process presents on every request
    #[serde(default = "default_trusted_origin")]
    pub trusted_origin: String,

    /// PBKDF2 iterations written into new vault configs and member keyrings.
    /// Existing installations keep the count stored alongside their salts.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Auto-lock minutes offered when enabling the vault (0 = never)
    #[serde(default = "default_auto_lock_minutes")]
    pub default_auto_lock_minutes: u32,

    /// Minimum accepted length for vault and member passwords
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,

    /// Argon2 cost for member-level password hashes
    #[serde(default)]
    pub member_hash: MemberHashParams,

    /// Default tracing filter when `HEARTH_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_trusted_origin() -> String {
    "hearth://ui".to_string()
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_auto_lock_minutes() -> u32 {
    15
}

fn default_min_password_length() -> usize {
    8
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            trusted_origin: default_trusted_origin(),
            kdf_iterations: default_kdf_iterations(),
            default_auto_lock_minutes: default_auto_lock_minutes(),
            min_password_length: default_min_password_length(),
            member_hash: MemberHashParams::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &HearthPaths) -> Result<Self, HearthError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| HearthError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                HearthError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            settings.validate()?;
            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &HearthPaths) -> Result<(), HearthError> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    /// Reject settings that would weaken or break key derivation
    pub fn validate(&self) -> Result<(), HearthError> {
        if self.kdf_iterations == 0 {
            return Err(HearthError::Config(
                "kdf_iterations must be greater than zero".into(),
            ));
        }
        if self.trusted_origin.trim().is_empty() {
            return Err(HearthError::Config("trusted_origin cannot be empty".into()));
        }
        Ok(())
    }
}
