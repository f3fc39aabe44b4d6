//! Process-wide vault context
//!
//! `VaultContext` owns the lock state, the loaded store, open member sessions,
//! the idle timer and the lock broadcaster. Every request passes through
//! [`VaultContext::guard`] before it touches any of them.

use std::collections::HashMap;
use std::sync::{mpsc, Arc};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::broadcast::{LockBroadcaster, LockEvent, LockReason};
use crate::config::{HearthPaths, Settings};
use crate::entity::UserSession;
use crate::error::{HearthError, HearthResult};
use crate::models::UserId;
use crate::storage::Storage;
use crate::vault::{
    AutoLockTarget, Clock, CrashRecoveryGuard, DiskState, IdleTimer, RecoveryOutcome, SystemClock,
    VaultManager, VaultState,
};

/// Identity a request arrives with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin(String);

impl Origin {
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    /// The origin configured as trusted in `settings`
    pub fn trusted(settings: &Settings) -> Self {
        Self(settings.trusted_origin.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether a request may run while the vault is locked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockPolicy {
    AllowWhenLocked,
    RequireUnlocked,
}

pub struct VaultContext {
    paths: HearthPaths,
    settings: Settings,
    pub(crate) vault: VaultManager,
    recovery: CrashRecoveryGuard,
    idle: IdleTimer,
    broadcaster: LockBroadcaster,
    pub(crate) storage: Option<Storage>,
    pub(crate) sessions: HashMap<UserId, UserSession>,
    pending_recovery: bool,
}

impl VaultContext {
    /// Open with the system clock
    pub fn open(paths: HearthPaths, settings: Settings) -> HearthResult<Self> {
        Self::open_with_clock(paths, settings, Arc::new(SystemClock))
    }

    /// Inspect the disk, load the vault config, and load the store if it is
    /// not protected by the vault
    pub fn open_with_clock(
        paths: HearthPaths,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> HearthResult<Self> {
        paths.ensure_directories()?;
        let vault = VaultManager::open(&paths, &settings)?;
        let recovery = CrashRecoveryGuard::new(&paths);
        let disk = recovery.inspect(vault.config())?;

        let storage = if vault.is_enabled() {
            None
        } else {
            Some(Storage::open(paths.store_file())?)
        };
        let minutes = vault.config().map(|c| c.auto_lock_minutes).unwrap_or(0);
        info!(state = %vault.state(), ?disk, "Vault context opened");

        Ok(Self {
            idle: IdleTimer::new(clock, minutes),
            paths,
            settings,
            vault,
            recovery,
            broadcaster: LockBroadcaster::new(),
            storage,
            sessions: HashMap::new(),
            pending_recovery: disk == DiskState::Ambiguous,
        })
    }

    pub fn paths(&self) -> &HearthPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> VaultState {
        self.vault.state()
    }

    pub fn vault(&self) -> &VaultManager {
        &self.vault
    }

    /// Whether an interrupted swap must be resolved before unlocking
    pub fn recovery_pending(&self) -> bool {
        self.pending_recovery
    }

    /// Receive every future lock event
    pub fn subscribe(&mut self) -> mpsc::Receiver<LockEvent> {
        self.broadcaster.subscribe()
    }

    /// The loaded store; absent while locked
    pub fn storage(&self) -> HearthResult<&Storage> {
        self.storage.as_ref().ok_or(HearthError::Locked)
    }

    pub(crate) fn session(&self, user_id: UserId) -> Option<&UserSession> {
        self.sessions.get(&user_id)
    }

    fn is_locked(&self) -> bool {
        matches!(self.vault.state(), VaultState::Locked | VaultState::Detached)
    }

    /// Whether a store left decrypted by an earlier process has been idle
    /// past the auto-lock timeout
    pub fn detach_expired(&self) -> bool {
        self.vault.detach_expired(Utc::now())
    }

    /// Origin check, auto-lock expiry, then lock state
    ///
    /// Activity that passes the guard while unlocked resets the idle timer.
    pub(crate) fn guard(&mut self, origin: &Origin, policy: LockPolicy) -> HearthResult<()> {
        if origin.as_str() != self.settings.trusted_origin {
            warn!(origin = origin.as_str(), "Rejected request from untrusted origin");
            return Err(HearthError::UntrustedOrigin(origin.as_str().to_string()));
        }

        self.check_idle()?;

        if self.is_locked() && policy == LockPolicy::RequireUnlocked {
            return Err(HearthError::Locked);
        }
        if self.vault.is_unlocked() {
            self.idle.touch();
        }
        Ok(())
    }

    /// Guard for requests that need an unlocked vault
    pub fn authorize(&mut self, origin: &Origin) -> HearthResult<()> {
        self.guard(origin, LockPolicy::RequireUnlocked)
    }

    /// Save the store, seal it, drop every key, and tell subscribers
    pub(crate) fn lock_now(&mut self, reason: LockReason) -> HearthResult<()> {
        if !self.vault.is_unlocked() {
            self.sessions.clear();
            return Ok(());
        }
        if let Some(storage) = &self.storage {
            storage.save()?;
        }
        self.vault.lock()?;
        self.sessions.clear();
        self.storage = None;
        self.broadcaster.broadcast(LockEvent::new(reason));
        Ok(())
    }

    /// Unlock, resolving an interrupted swap first if one is pending
    pub(crate) fn unlock_with(&mut self, password: &str) -> HearthResult<bool> {
        if self.pending_recovery {
            let config = self.vault.config().ok_or(HearthError::VaultNotEnabled)?;
            match self.recovery.resolve(password, config) {
                Ok(RecoveryOutcome::EnvelopeKept) => {}
                Ok(RecoveryOutcome::PlaintextKept { quarantined }) => {
                    warn!(path = %quarantined.display(), "Unlocking from plaintext; corrupt envelope kept aside");
                }
                Err(HearthError::WrongPassword) => return Ok(false),
                Err(e) => return Err(e),
            }
            self.pending_recovery = false;
        }

        if !self.vault.unlock(password)? {
            return Ok(false);
        }
        self.storage = Some(Storage::open(self.paths.store_file())?);
        self.idle.touch();
        Ok(true)
    }

    pub(crate) fn set_idle_minutes(&mut self, minutes: u32) {
        self.idle.set_timeout_minutes(minutes);
        self.idle.touch();
    }

    /// Seal a store left decrypted on disk by an earlier process
    ///
    /// Returns false when nothing was sealed: the store is not detached, or
    /// an interrupted swap must be resolved by unlocking first.
    pub fn seal_with_password(&mut self, origin: &Origin, password: &str) -> HearthResult<bool> {
        self.guard(origin, LockPolicy::AllowWhenLocked)?;
        if self.pending_recovery {
            return Ok(false);
        }
        let sealed = self.vault.seal_detached(password)?;
        if sealed {
            self.broadcaster.broadcast(LockEvent::new(LockReason::Manual));
        }
        Ok(sealed)
    }

    /// Open a member session for later record and sharing requests
    pub fn open_member_session(
        &mut self,
        origin: &Origin,
        user_id: UserId,
        secret: &str,
    ) -> HearthResult<()> {
        self.authorize(origin)?;
        let session =
            crate::entity::EntityKeyStore::new(self.storage()?).open_session(user_id, secret)?;
        self.sessions.insert(user_id, session);
        debug!(user = %user_id, "Member session opened");
        Ok(())
    }

    pub fn close_member_session(&mut self, user_id: UserId) -> bool {
        self.sessions.remove(&user_id).is_some()
    }

    /// Save, seal an enabled vault, and drop every key
    pub fn shutdown(mut self) -> HearthResult<()> {
        if self.vault.is_unlocked() {
            self.lock_now(LockReason::Shutdown)?;
        } else if let Some(storage) = &self.storage {
            storage.save()?;
        }
        info!("Vault context shut down");
        Ok(())
    }

    /// Save the store but leave it decrypted on disk
    ///
    /// An unlocked vault records the time so the next process can apply
    /// auto-lock to the detached store.
    pub fn detach(mut self) -> HearthResult<()> {
        if let Some(storage) = &self.storage {
            storage.save()?;
        }
        if self.vault.is_unlocked() {
            self.vault.detach(Utc::now())?;
        }
        self.sessions.clear();
        self.storage = None;
        Ok(())
    }
}

impl AutoLockTarget for VaultContext {
    fn check_idle(&mut self) -> HearthResult<bool> {
        if self.vault.is_unlocked() && self.idle.is_expired() {
            info!(idle_secs = self.idle.idle_for().as_secs(), "Idle timeout reached");
            self.lock_now(LockReason::Idle)?;
            return Ok(true);
        }
        Ok(false)
    }
}
