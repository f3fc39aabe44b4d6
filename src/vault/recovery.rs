//! Crash recovery for interrupted encrypt/decrypt swaps
//!
//! Both at-rest transitions write the new file and then delete the old one.
//! A crash in between leaves both the plaintext store and the envelope on
//! disk. The guard detects that state and settles which copy is live.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use super::config::VaultConfig;
use super::envelope::VaultEnvelope;
use crate::config::HearthPaths;
use crate::error::{HearthError, HearthResult};
use crate::storage::file_io::{remove_if_exists, TEMP_SUFFIX};

/// What the guard found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskState {
    /// Neither the store nor the envelope exists
    Fresh,
    /// Only the plaintext store exists
    Plaintext,
    /// Only the envelope exists
    Encrypted,
    /// Both exist; neither is live until resolved
    Ambiguous,
}

/// How an ambiguous state was settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The envelope authenticated; the stale plaintext was removed
    EnvelopeKept,
    /// The envelope failed authentication and was moved aside
    PlaintextKept { quarantined: PathBuf },
}

/// Inspects and repairs the store files before the vault opens
pub struct CrashRecoveryGuard {
    data_dir: PathBuf,
    store_path: PathBuf,
    envelope_path: PathBuf,
}

impl CrashRecoveryGuard {
    pub fn new(paths: &HearthPaths) -> Self {
        Self {
            data_dir: paths.data_dir(),
            store_path: paths.store_file(),
            envelope_path: paths.envelope_file(),
        }
    }

    /// Classify the disk and remove stale temp files
    ///
    /// An envelope with no vault config is an error: without the config the
    /// envelope cannot be opened, and it must never be silently dropped.
    pub fn inspect(&self, config: Option<&VaultConfig>) -> HearthResult<DiskState> {
        self.remove_stale_temp_files()?;

        let state = match (self.store_path.exists(), self.envelope_path.exists()) {
            (false, false) => DiskState::Fresh,
            (true, false) => DiskState::Plaintext,
            (false, true) => DiskState::Encrypted,
            (true, true) => DiskState::Ambiguous,
        };

        if config.is_none() && matches!(state, DiskState::Encrypted | DiskState::Ambiguous) {
            return Err(HearthError::MissingFile(format!(
                "vault config for encrypted store {}",
                self.envelope_path.display()
            )));
        }
        if state == DiskState::Ambiguous {
            warn!("Found both plaintext and encrypted store; recovery required");
        }
        Ok(state)
    }

    fn remove_stale_temp_files(&self) -> HearthResult<()> {
        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(HearthError::Io(format!(
                    "Failed to read {}: {}",
                    self.data_dir.display(),
                    e
                )))
            }
        };

        for entry in entries {
            let path = entry?.path();
            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TEMP_SUFFIX));
            if is_temp && path.is_file() {
                remove_if_exists(&path)?;
                warn!(path = %path.display(), "Removed stale temp file");
            }
        }
        Ok(())
    }

    /// Settle an ambiguous state with the master password
    ///
    /// A wrong password is `WrongPassword` and touches nothing. Otherwise the
    /// envelope is fully authenticated: on success it is authoritative and the
    /// plaintext is discarded; on failure it is renamed to
    /// `<store>.enc.corrupt-<timestamp>` and the plaintext is authoritative.
    pub fn resolve(&self, password: &str, config: &VaultConfig) -> HearthResult<RecoveryOutcome> {
        if !config.verify_password(password)? {
            warn!("Recovery rejected: wrong password");
            return Err(HearthError::WrongPassword);
        }
        if !(self.store_path.exists() && self.envelope_path.exists()) {
            return Err(HearthError::Validation(
                "Nothing to recover: store is not in an ambiguous state".into(),
            ));
        }

        let authenticated = VaultEnvelope::read(&self.envelope_path)
            .and_then(|envelope| envelope.open_with_password(config, password));

        match authenticated {
            Ok(_) => {
                remove_if_exists(&self.store_path)?;
                info!("Recovery kept the envelope and removed the stale plaintext");
                Ok(RecoveryOutcome::EnvelopeKept)
            }
            Err(HearthError::CorruptVault(reason)) => {
                let quarantined = self.quarantine_path();
                std::fs::rename(&self.envelope_path, &quarantined).map_err(|e| {
                    HearthError::Io(format!("Failed to move corrupt envelope aside: {}", e))
                })?;
                warn!(
                    %reason,
                    path = %quarantined.display(),
                    "Recovery moved a corrupt envelope aside and kept the plaintext"
                );
                Ok(RecoveryOutcome::PlaintextKept { quarantined })
            }
            Err(e) => Err(e),
        }
    }

    fn quarantine_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let mut name = self.envelope_path.as_os_str().to_os_string();
        name.push(format!(".corrupt-{}", stamp));
        PathBuf::from(name)
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn envelope_path(&self) -> &Path {
        &self.envelope_path
    }
}
