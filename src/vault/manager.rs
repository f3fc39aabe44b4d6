//! Vault lock state machine
//!
//! `VaultManager` owns the vault config, the lock state, and the session key.
//! The plaintext store exists on disk only while the vault is unlocked or
//! detached; lock seals it into `<store>.enc` and unlock restores it.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::VaultConfig;
use super::envelope::VaultEnvelope;
use super::session::SessionKey;
use crate::config::{HearthPaths, Settings};
use crate::crypto::SecretKey;
use crate::error::{HearthError, HearthResult};
use crate::storage::file_io::{remove_if_exists, write_bytes_atomic};

/// Lock state of the vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultState {
    /// No vault config and no store
    Uninitialized,
    /// No vault config; the store is plaintext
    Disabled,
    /// Enabled with the session key in memory
    Unlocked,
    /// Enabled with no key in memory
    Locked,
    /// Enabled with no key in memory, but the store was left decrypted on
    /// disk by an earlier process
    Detached,
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Disabled => write!(f, "disabled"),
            Self::Unlocked => write!(f, "unlocked"),
            Self::Locked => write!(f, "locked"),
            Self::Detached => write!(f, "unlocked (on disk)"),
        }
    }
}

/// Snapshot reported by the `status` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultStatus {
    pub state: VaultState,
    pub enabled: bool,
    pub auto_lock_minutes: Option<u32>,
    pub encrypted_at_rest: bool,
    /// Set while the store is detached
    pub detached_at: Option<DateTime<Utc>>,
}

/// Which secret seals the store in [`VaultManager::encrypt_at_rest`]
pub enum AtRestKey<'a> {
    Password(&'a str),
    Session,
}

/// Owner of the vault config, lock state and session key
pub struct VaultManager {
    config_path: PathBuf,
    store_path: PathBuf,
    envelope_path: PathBuf,
    kdf_iterations: u32,
    min_password_length: usize,
    config: Option<VaultConfig>,
    state: VaultState,
    session: Option<SessionKey>,
}

impl VaultManager {
    /// Load the vault config and derive the initial state
    ///
    /// An enabled vault never starts unlocked. It opens `Detached` when the
    /// plaintext store is on disk without an envelope, otherwise `Locked`.
    pub fn open(paths: &HearthPaths, settings: &Settings) -> HearthResult<Self> {
        let config_path = paths.vault_config_file();
        let store_path = paths.store_file();
        let envelope_path = paths.envelope_file();
        let config = VaultConfig::load(&config_path)?;

        let state = match &config {
            Some(_) if store_path.exists() && !envelope_path.exists() => VaultState::Detached,
            Some(_) => VaultState::Locked,
            None if store_path.exists() => VaultState::Disabled,
            None => VaultState::Uninitialized,
        };
        debug!(%state, "Opened vault");

        Ok(Self {
            config_path,
            store_path,
            envelope_path,
            kdf_iterations: settings.kdf_iterations,
            min_password_length: settings.min_password_length,
            config,
            state,
            session: None,
        })
    }

    pub fn state(&self) -> VaultState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == VaultState::Unlocked
    }

    /// Whether a session key is currently held in memory
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> Option<&VaultConfig> {
        self.config.as_ref()
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn envelope_path(&self) -> &Path {
        &self.envelope_path
    }

    pub fn status(&self) -> VaultStatus {
        VaultStatus {
            state: self.state,
            enabled: self.is_enabled(),
            auto_lock_minutes: self.config.as_ref().map(|c| c.auto_lock_minutes),
            encrypted_at_rest: self.envelope_path.exists(),
            detached_at: match self.state {
                VaultState::Detached => self.config.as_ref().and_then(|c| c.detached_at),
                _ => None,
            },
        }
    }

    /// Whether a detached store has outlived the auto-lock timeout at `now`
    ///
    /// Always false with auto-lock off. A detached store with no recorded
    /// time counts as expired.
    pub fn detach_expired(&self, now: DateTime<Utc>) -> bool {
        let Some(config) = &self.config else {
            return false;
        };
        if self.state != VaultState::Detached || config.auto_lock_minutes == 0 {
            return false;
        }
        match config.detached_at {
            Some(at) => now - at >= chrono::Duration::minutes(i64::from(config.auto_lock_minutes)),
            None => true,
        }
    }

    /// Leave the plaintext store on disk and drop the session key
    ///
    /// The time is recorded so a later process can apply auto-lock.
    pub fn detach(&mut self, at: DateTime<Utc>) -> HearthResult<()> {
        if self.state != VaultState::Unlocked {
            return Err(HearthError::Locked);
        }
        self.set_detached_at(Some(at))?;
        self.session = None;
        self.state = VaultState::Detached;
        info!("Vault detached; store left decrypted on disk");
        Ok(())
    }

    /// Seal a detached store with the password and flip to `Locked`
    ///
    /// Returns false when the store is not detached.
    pub fn seal_detached(&mut self, password: &str) -> HearthResult<bool> {
        if self.state != VaultState::Detached {
            return Ok(false);
        }
        self.encrypt_at_rest(AtRestKey::Password(password))?;
        self.set_detached_at(None)?;
        self.state = VaultState::Locked;
        info!("Detached store sealed");
        Ok(true)
    }

    fn set_detached_at(&mut self, at: Option<DateTime<Utc>>) -> HearthResult<()> {
        let mut config = self.require_config()?.clone();
        if config.detached_at == at {
            return Ok(());
        }
        config.detached_at = at;
        config.save(&self.config_path)?;
        self.config = Some(config);
        Ok(())
    }

    fn require_config(&self) -> HearthResult<&VaultConfig> {
        self.config.as_ref().ok_or(HearthError::VaultNotEnabled)
    }

    fn check_password_length(&self, password: &str) -> HearthResult<()> {
        if password.chars().count() < self.min_password_length {
            return Err(HearthError::Validation(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }

    fn session_key_for(config: &VaultConfig, password: &str) -> HearthResult<SecretKey> {
        config.encryption_key(password, &config.encryption_salt_bytes()?)
    }

    /// Turn on whole-file encryption and open a session
    pub fn enable(&mut self, password: &str, auto_lock_minutes: u32) -> HearthResult<()> {
        if self.config.is_some() {
            return Err(HearthError::AlreadyEnabled);
        }
        self.check_password_length(password)?;

        let config = VaultConfig::create(password, self.kdf_iterations, auto_lock_minutes)?;
        let key = Self::session_key_for(&config, password)?;
        config.save(&self.config_path)?;

        self.config = Some(config);
        self.session = Some(SessionKey::new(key));
        self.state = VaultState::Unlocked;
        info!(auto_lock_minutes, "Vault enabled");
        Ok(())
    }

    /// Check `candidate` against the stored hash
    pub fn verify_password(&self, candidate: &str) -> HearthResult<bool> {
        self.require_config()?.verify_password(candidate)
    }

    /// Turn off whole-file encryption
    ///
    /// A store still sealed on disk is restored first so no data is stranded.
    pub fn disable(&mut self, password: &str) -> HearthResult<()> {
        if !self.verify_password(password)? {
            warn!("Vault disable rejected: wrong password");
            return Err(HearthError::WrongPassword);
        }
        if self.envelope_path.exists() {
            self.decrypt_at_rest(password)?;
        }

        self.session = None;
        VaultConfig::delete(&self.config_path)?;
        self.config = None;
        self.state = if self.store_path.exists() {
            VaultState::Disabled
        } else {
            VaultState::Uninitialized
        };
        info!("Vault disabled");
        Ok(())
    }

    /// Replace the master password
    ///
    /// Both salts and the hash are regenerated and the session key is
    /// re-derived. Only allowed while unlocked, when the store is plaintext.
    pub fn change_password(&mut self, current: &str, new: &str) -> HearthResult<()> {
        if !self.verify_password(current)? {
            warn!("Password change rejected: wrong password");
            return Err(HearthError::WrongPassword);
        }
        if self.state != VaultState::Unlocked {
            return Err(HearthError::Locked);
        }
        self.check_password_length(new)?;

        let mut config = self.require_config()?.clone();
        config.reset_password(new)?;
        let key = Self::session_key_for(&config, new)?;
        config.save(&self.config_path)?;

        self.config = Some(config);
        self.session = Some(SessionKey::new(key));
        info!("Vault password changed");
        Ok(())
    }

    /// Persist a new idle timeout; 0 disables auto-lock
    pub fn update_auto_lock(&mut self, minutes: u32) -> HearthResult<()> {
        let mut config = self.require_config()?.clone();
        config.auto_lock_minutes = minutes;
        config.save(&self.config_path)?;
        self.config = Some(config);
        info!(minutes, "Auto-lock updated");
        Ok(())
    }

    /// Seal the store, drop the session key, and flip to `Locked`
    ///
    /// Locking an already locked or detached vault only drops the key; a
    /// detached store is sealed by `seal_detached`. If sealing fails the vault
    /// stays unlocked.
    pub fn lock(&mut self) -> HearthResult<()> {
        match self.state {
            VaultState::Locked | VaultState::Detached => {
                self.session = None;
                Ok(())
            }
            VaultState::Unlocked => {
                if self.store_path.exists() {
                    self.encrypt_at_rest(AtRestKey::Session)?;
                }
                self.set_detached_at(None)?;
                self.session = None;
                self.state = VaultState::Locked;
                info!("Vault locked");
                Ok(())
            }
            VaultState::Uninitialized | VaultState::Disabled => Err(HearthError::VaultNotEnabled),
        }
    }

    /// Re-verify the password, restore the store, and open a session
    ///
    /// A wrong password returns `Ok(false)` and changes nothing. A sealed
    /// store that fails authentication is `CorruptVault`; the envelope is left
    /// in place and the vault stays locked.
    pub fn unlock(&mut self, password: &str) -> HearthResult<bool> {
        let config = self.require_config()?;
        if !config.verify_password(password)? {
            warn!("Vault unlock failed: wrong password");
            return Ok(false);
        }
        if self.state == VaultState::Unlocked {
            return Ok(true);
        }

        let salt = config.encryption_salt_bytes()?;
        let key = config.encryption_key(password, &salt)?;

        if self.envelope_path.exists() {
            let envelope = VaultEnvelope::read(&self.envelope_path)?;
            let plaintext = if envelope.salt == salt {
                envelope.open(&key)?
            } else {
                envelope.open_with_password(config, password)?
            };
            write_bytes_atomic(&self.store_path, &plaintext)?;
            remove_if_exists(&self.envelope_path)?;
            debug!("Restored plaintext store from envelope");
        }

        self.session = Some(SessionKey::new(key));
        self.state = VaultState::Unlocked;
        info!("Vault unlocked");
        Ok(true)
    }

    /// Seal the plaintext store into the envelope and delete the plaintext
    pub fn encrypt_at_rest(&self, key: AtRestKey<'_>) -> HearthResult<()> {
        let config = self.require_config()?;
        let salt = config.encryption_salt_bytes()?;

        let derived;
        let key = match key {
            AtRestKey::Session => self.session.as_ref().ok_or(HearthError::Locked)?.key(),
            AtRestKey::Password(password) => {
                if !config.verify_password(password)? {
                    return Err(HearthError::WrongPassword);
                }
                derived = config.encryption_key(password, &salt)?;
                &derived
            }
        };

        let plaintext = zeroize::Zeroizing::new(std::fs::read(&self.store_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HearthError::MissingFile(self.store_path.display().to_string())
            } else {
                HearthError::Io(format!("Failed to read store: {}", e))
            }
        })?);

        VaultEnvelope::seal(key, salt, &plaintext)?.write(&self.envelope_path)?;
        remove_if_exists(&self.store_path)?;
        info!(bytes = plaintext.len(), "Store encrypted at rest");
        Ok(())
    }

    /// Restore the plaintext store from the envelope
    ///
    /// The password is verified, then the tag, before any plaintext is
    /// written. A tag failure is `CorruptVault` and leaves the envelope as is.
    pub fn decrypt_at_rest(&self, password: &str) -> HearthResult<()> {
        let config = self.require_config()?;
        if !config.verify_password(password)? {
            return Err(HearthError::WrongPassword);
        }

        let envelope = VaultEnvelope::read(&self.envelope_path)?;
        let plaintext = envelope.open_with_password(config, password).map_err(|e| {
            warn!("Envelope failed authentication with a verified password");
            e
        })?;

        write_bytes_atomic(&self.store_path, &plaintext)?;
        remove_if_exists(&self.envelope_path)?;
        info!("Store decrypted at rest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PASSWORD: &str = "kitchen-table-42";

    fn test_settings() -> Settings {
        Settings {
            kdf_iterations: 1_000,
            ..Settings::default()
        }
    }

    fn setup() -> (TempDir, HearthPaths, VaultManager) {
        let temp_dir = TempDir::new().unwrap();
        let paths = HearthPaths::with_base_dir(temp_dir.path().to_path_buf());
        paths.ensure_directories().unwrap();
        let manager = VaultManager::open(&paths, &test_settings()).unwrap();
        (temp_dir, paths, manager)
    }

    fn write_store(paths: &HearthPaths, contents: &str) {
        std::fs::write(paths.store_file(), contents).unwrap();
    }

    #[test]
    fn test_initial_states() {
        let (_tmp, paths, manager) = setup();
        assert_eq!(manager.state(), VaultState::Uninitialized);

        write_store(&paths, "{}");
        let manager = VaultManager::open(&paths, &test_settings()).unwrap();
        assert_eq!(manager.state(), VaultState::Disabled);
    }

    #[test]
    fn test_enable_then_reopen_is_locked() {
        let (_tmp, paths, mut manager) = setup();
        manager.enable(PASSWORD, 5).unwrap();
        assert_eq!(manager.state(), VaultState::Unlocked);
        assert!(manager.has_session());
        assert!(paths.vault_config_file().exists());

        let reopened = VaultManager::open(&paths, &test_settings()).unwrap();
        assert_eq!(reopened.state(), VaultState::Locked);
        assert!(!reopened.has_session());
    }

    #[test]
    fn test_enable_rejects_short_password_and_double_enable() {
        let (_tmp, _paths, mut manager) = setup();
        assert!(manager.enable("short", 5).unwrap_err().is_validation());

        manager.enable(PASSWORD, 5).unwrap();
        assert!(matches!(
            manager.enable(PASSWORD, 5).unwrap_err(),
            HearthError::AlreadyEnabled
        ));
    }

    #[test]
    fn test_lock_seals_and_unlock_restores() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, r#"{"users":[]}"#);
        manager.enable(PASSWORD, 5).unwrap();

        manager.lock().unwrap();
        assert!(!paths.store_file().exists());
        assert!(paths.envelope_file().exists());
        let raw = std::fs::read(paths.envelope_file()).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("users"));

        assert!(manager.unlock(PASSWORD).unwrap());
        assert_eq!(
            std::fs::read_to_string(paths.store_file()).unwrap(),
            r#"{"users":[]}"#
        );
        assert!(!paths.envelope_file().exists());
    }

    #[test]
    fn test_wrong_unlock_changes_nothing() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, "{}");
        manager.enable(PASSWORD, 5).unwrap();
        manager.lock().unwrap();
        let before = std::fs::read(paths.envelope_file()).unwrap();

        assert!(!manager.unlock("not-the-password").unwrap());
        assert_eq!(manager.state(), VaultState::Locked);
        assert!(!manager.has_session());
        assert_eq!(std::fs::read(paths.envelope_file()).unwrap(), before);
        assert!(!paths.store_file().exists());
    }

    #[test]
    fn test_double_lock_is_safe() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, "{}");
        manager.enable(PASSWORD, 5).unwrap();

        manager.lock().unwrap();
        manager.lock().unwrap();

        assert_eq!(manager.state(), VaultState::Locked);
        assert!(!manager.has_session());
        assert!(paths.envelope_file().exists());
    }

    #[test]
    fn test_lock_requires_enabled_vault() {
        let (_tmp, _paths, mut manager) = setup();
        assert!(matches!(
            manager.lock().unwrap_err(),
            HearthError::VaultNotEnabled
        ));
    }

    #[test]
    fn test_corrupt_envelope_is_reported_and_kept() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, r#"{"records":[]}"#);
        manager.enable(PASSWORD, 5).unwrap();
        manager.lock().unwrap();

        let mut bytes = std::fs::read(paths.envelope_file()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x80;
        std::fs::write(paths.envelope_file(), &bytes).unwrap();

        let err = manager.unlock(PASSWORD).unwrap_err();
        assert!(matches!(err, HearthError::CorruptVault(_)));
        assert_eq!(manager.state(), VaultState::Locked);
        assert_eq!(std::fs::read(paths.envelope_file()).unwrap(), bytes);
        assert!(!paths.store_file().exists());

        let err = manager.decrypt_at_rest(PASSWORD).unwrap_err();
        assert!(matches!(err, HearthError::CorruptVault(_)));
        assert!(paths.envelope_file().exists());
    }

    #[test]
    fn test_decrypt_at_rest_checks_password_first() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, "{}");
        manager.enable(PASSWORD, 5).unwrap();
        manager.encrypt_at_rest(AtRestKey::Password(PASSWORD)).unwrap();

        assert!(matches!(
            manager.decrypt_at_rest("wrong-password").unwrap_err(),
            HearthError::WrongPassword
        ));
        assert!(paths.envelope_file().exists());

        manager.decrypt_at_rest(PASSWORD).unwrap();
        assert!(paths.store_file().exists());
        assert!(!paths.envelope_file().exists());
    }

    #[test]
    fn test_encrypt_at_rest_with_session_requires_unlock() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, "{}");
        manager.enable(PASSWORD, 5).unwrap();
        manager.lock().unwrap();
        manager.decrypt_at_rest(PASSWORD).unwrap();

        assert!(matches!(
            manager.encrypt_at_rest(AtRestKey::Session).unwrap_err(),
            HearthError::Locked
        ));
    }

    #[test]
    fn test_disable_requires_password_and_restores_store() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, r#"{"keys":[]}"#);
        manager.enable(PASSWORD, 5).unwrap();
        manager.lock().unwrap();

        assert!(matches!(
            manager.disable("wrong-password").unwrap_err(),
            HearthError::WrongPassword
        ));
        assert!(paths.vault_config_file().exists());

        manager.disable(PASSWORD).unwrap();
        assert_eq!(manager.state(), VaultState::Disabled);
        assert!(!manager.has_session());
        assert!(!paths.vault_config_file().exists());
        assert!(paths.store_file().exists());
        assert!(!paths.envelope_file().exists());
    }

    #[test]
    fn test_change_password() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, r#"{"users":[]}"#);
        manager.enable(PASSWORD, 5).unwrap();
        let old_salt = manager.config().unwrap().encryption_salt.clone();

        assert!(matches!(
            manager.change_password("wrong-password", "brand-new-pass").unwrap_err(),
            HearthError::WrongPassword
        ));

        manager.change_password(PASSWORD, "brand-new-pass").unwrap();
        assert_ne!(manager.config().unwrap().encryption_salt, old_salt);
        assert!(manager.verify_password("brand-new-pass").unwrap());
        assert!(!manager.verify_password(PASSWORD).unwrap());

        manager.lock().unwrap();
        assert!(!manager.unlock(PASSWORD).unwrap());
        assert!(manager.unlock("brand-new-pass").unwrap());
        assert!(paths.store_file().exists());
    }

    #[test]
    fn test_update_auto_lock_persists() {
        let (_tmp, paths, mut manager) = setup();
        manager.enable(PASSWORD, 5).unwrap();
        manager.update_auto_lock(0).unwrap();

        let reopened = VaultManager::open(&paths, &test_settings()).unwrap();
        assert_eq!(reopened.status().auto_lock_minutes, Some(0));
    }

    #[test]
    fn test_detached_store_reopens_detached_and_expires() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, "{}");
        manager.enable(PASSWORD, 10).unwrap();
        let at = Utc::now();
        manager.detach(at).unwrap();
        assert!(!manager.has_session());

        let mut reopened = VaultManager::open(&paths, &test_settings()).unwrap();
        assert_eq!(reopened.state(), VaultState::Detached);
        assert_eq!(reopened.state().to_string(), "unlocked (on disk)");
        assert_eq!(reopened.status().detached_at, Some(at));
        assert!(!reopened.detach_expired(at + chrono::Duration::minutes(9)));
        assert!(reopened.detach_expired(at + chrono::Duration::minutes(10)));

        assert!(matches!(
            reopened.seal_detached("not-the-password"),
            Err(HearthError::WrongPassword)
        ));
        assert!(reopened.seal_detached(PASSWORD).unwrap());
        assert_eq!(reopened.state(), VaultState::Locked);
        assert!(paths.envelope_file().exists());
        assert!(!paths.store_file().exists());
        assert_eq!(reopened.config().unwrap().detached_at, None);
    }

    #[test]
    fn test_detach_never_expires_with_auto_lock_off() {
        let (_tmp, paths, mut manager) = setup();
        write_store(&paths, "{}");
        manager.enable(PASSWORD, 0).unwrap();
        manager.detach(Utc::now()).unwrap();

        let reopened = VaultManager::open(&paths, &test_settings()).unwrap();
        assert!(!reopened.detach_expired(Utc::now() + chrono::Duration::days(30)));
    }
}
