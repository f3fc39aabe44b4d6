//! Persisted vault configuration (`vault.json`)
//!
//! Absence of the file is a valid state: the vault has never been enabled, or
//! it was disabled.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::{constant_time_eq, derive, generate_salt, KeyPurpose, SecretKey, SALT_LEN};
use crate::error::{HearthError, HearthResult};
use crate::storage::file_io::{read_json_required, remove_if_exists, write_json_atomic};

/// Current vault config schema
pub const VAULT_SCHEMA_VERSION: u32 = 1;

/// Vault configuration written when the vault is enabled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub enabled: bool,

    /// Verification hash of the master password (base64)
    pub password_hash: String,

    /// Salt for the verification hash (base64, 32 bytes)
    pub hash_salt: String,

    /// Salt for the at-rest encryption key (base64, 32 bytes)
    pub encryption_salt: String,

    /// PBKDF2 iterations for both derivations
    pub iterations: u32,

    /// Idle minutes before auto-lock; 0 disables
    pub auto_lock_minutes: u32,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub created_at: DateTime<Utc>,

    /// When `vault unlock` last left the store decrypted on disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detached_at: Option<DateTime<Utc>>,
}

fn default_schema_version() -> u32 {
    VAULT_SCHEMA_VERSION
}

fn decode_salt(encoded: &str, name: &str) -> HearthResult<[u8; SALT_LEN]> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| HearthError::Config(format!("Invalid {} encoding: {}", name, e)))?;
    bytes
        .try_into()
        .map_err(|_| HearthError::Config(format!("{} must be {} bytes", name, SALT_LEN)))
}

impl VaultConfig {
    /// Build a config for `password` with fresh random salts
    pub fn create(password: &str, iterations: u32, auto_lock_minutes: u32) -> HearthResult<Self> {
        let mut config = Self {
            enabled: true,
            password_hash: String::new(),
            hash_salt: String::new(),
            encryption_salt: String::new(),
            iterations,
            auto_lock_minutes,
            schema_version: VAULT_SCHEMA_VERSION,
            created_at: Utc::now(),
            detached_at: None,
        };
        config.reset_password(password)?;
        Ok(config)
    }

    /// Regenerate both salts and the verification hash for `password`
    pub fn reset_password(&mut self, password: &str) -> HearthResult<()> {
        let hash_salt = generate_salt();
        let encryption_salt = generate_salt();
        let hash = derive(password, &hash_salt, self.iterations, KeyPurpose::PasswordHash)?;

        self.hash_salt = STANDARD.encode(hash_salt);
        self.encryption_salt = STANDARD.encode(encryption_salt);
        self.password_hash = STANDARD.encode(hash.as_bytes());
        Ok(())
    }

    /// Load the config if present
    pub fn load(path: &Path) -> HearthResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let config: VaultConfig = read_json_required(path)?;
        if config.schema_version > VAULT_SCHEMA_VERSION {
            return Err(HearthError::Config(format!(
                "Vault config version {} is not supported",
                config.schema_version
            )));
        }
        config.hash_salt_bytes()?;
        config.encryption_salt_bytes()?;
        Ok(Some(config))
    }

    /// Write the config atomically
    pub fn save(&self, path: &Path) -> HearthResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HearthError::Io(format!("Failed to create config directory: {}", e)))?;
        }
        write_json_atomic(path, self)?;
        debug!(path = %path.display(), "Saved vault config");
        Ok(())
    }

    /// Remove the config file
    pub fn delete(path: &Path) -> HearthResult<()> {
        remove_if_exists(path)?;
        Ok(())
    }

    pub fn hash_salt_bytes(&self) -> HearthResult<[u8; SALT_LEN]> {
        decode_salt(&self.hash_salt, "hash_salt")
    }

    pub fn encryption_salt_bytes(&self) -> HearthResult<[u8; SALT_LEN]> {
        decode_salt(&self.encryption_salt, "encryption_salt")
    }

    /// Constant-time check of `candidate` against the stored hash
    pub fn verify_password(&self, candidate: &str) -> HearthResult<bool> {
        let expected = STANDARD
            .decode(&self.password_hash)
            .map_err(|e| HearthError::Config(format!("Invalid password_hash encoding: {}", e)))?;
        let derived = derive(
            candidate,
            &self.hash_salt_bytes()?,
            self.iterations,
            KeyPurpose::PasswordHash,
        )?;
        Ok(constant_time_eq(derived.as_bytes(), &expected))
    }

    /// Derive the at-rest encryption key for `password` and `salt`
    pub fn encryption_key(&self, password: &str, salt: &[u8; SALT_LEN]) -> HearthResult<SecretKey> {
        derive(password, salt, self.iterations, KeyPurpose::VaultEncryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn test_verify_password() {
        let config = VaultConfig::create("correct horse", TEST_ITERATIONS, 5).unwrap();
        assert!(config.verify_password("correct horse").unwrap());
        assert!(!config.verify_password("wrong horse").unwrap());
    }

    #[test]
    fn test_salts_are_independent() {
        let config = VaultConfig::create("pw-123456", TEST_ITERATIONS, 5).unwrap();
        assert_ne!(config.hash_salt, config.encryption_salt);
        assert_eq!(config.hash_salt_bytes().unwrap().len(), SALT_LEN);
    }

    #[test]
    fn test_hash_is_not_the_encryption_key() {
        let config = VaultConfig::create("pw-123456", TEST_ITERATIONS, 5).unwrap();
        let key = config
            .encryption_key("pw-123456", &config.hash_salt_bytes().unwrap())
            .unwrap();
        // Same salt, different purpose label
        assert_ne!(STANDARD.encode(key.as_bytes()), config.password_hash);
    }

    #[test]
    fn test_reset_regenerates_salts() {
        let mut config = VaultConfig::create("first-pass", TEST_ITERATIONS, 5).unwrap();
        let old_hash_salt = config.hash_salt.clone();
        let old_enc_salt = config.encryption_salt.clone();

        config.reset_password("second-pass").unwrap();

        assert_ne!(config.hash_salt, old_hash_salt);
        assert_ne!(config.encryption_salt, old_enc_salt);
        assert!(config.verify_password("second-pass").unwrap());
        assert!(!config.verify_password("first-pass").unwrap());
    }

    #[test]
    fn test_save_load_delete() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vault.json");
        assert!(VaultConfig::load(&path).unwrap().is_none());

        let config = VaultConfig::create("pw-123456", TEST_ITERATIONS, 7).unwrap();
        config.save(&path).unwrap();

        let loaded = VaultConfig::load(&path).unwrap().unwrap();
        assert_eq!(loaded.auto_lock_minutes, 7);
        assert!(loaded.verify_password("pw-123456").unwrap());

        VaultConfig::delete(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_salt_rejected_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vault.json");
        let mut config = VaultConfig::create("pw-123456", TEST_ITERATIONS, 7).unwrap();
        config.hash_salt = STANDARD.encode([0u8; 4]);
        config.save(&path).unwrap();

        assert!(VaultConfig::load(&path).is_err());
    }
}
