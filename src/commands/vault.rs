//! Vault command surface
//!
//! What the UI process can ask of the vault. Each command is guarded and then
//! dispatched against the context's `VaultManager`.

use serde::Serialize;
use tracing::{info, warn};

use super::broadcast::LockReason;
use super::context::{LockPolicy, Origin, VaultContext};
use crate::crypto::SecureString;
use crate::error::{HearthError, HearthResult};
use crate::services::HouseholdService;
use crate::vault::VaultStatus;

#[derive(Debug)]
pub enum VaultCommand {
    Status,
    Enable {
        password: SecureString,
        auto_lock_minutes: Option<u32>,
    },
    Disable {
        password: SecureString,
    },
    ChangePassword {
        current: SecureString,
        new: SecureString,
    },
    UpdateAutoLock {
        minutes: u32,
    },
    Lock,
    Unlock {
        password: SecureString,
    },
    /// Keeps the idle timer fresh
    Heartbeat,
}

impl VaultCommand {
    fn lock_policy(&self) -> LockPolicy {
        match self {
            Self::Status | Self::Unlock { .. } | Self::Heartbeat => LockPolicy::AllowWhenLocked,
            _ => LockPolicy::RequireUnlocked,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Enable { .. } => "enable",
            Self::Disable { .. } => "disable",
            Self::ChangePassword { .. } => "change_password",
            Self::UpdateAutoLock { .. } => "update_auto_lock",
            Self::Lock => "lock",
            Self::Unlock { .. } => "unlock",
            Self::Heartbeat => "heartbeat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VaultResponse {
    Status(VaultStatus),
    Unlocked(bool),
    Done,
}

impl VaultContext {
    /// Run one vault command from `origin`
    pub fn handle_vault(
        &mut self,
        origin: &Origin,
        command: VaultCommand,
    ) -> HearthResult<VaultResponse> {
        self.guard(origin, command.lock_policy())?;
        tracing::debug!(command = command.name(), "Vault command");

        match command {
            VaultCommand::Status => Ok(VaultResponse::Status(self.vault.status())),
            VaultCommand::Heartbeat => Ok(VaultResponse::Done),

            VaultCommand::Enable {
                password,
                auto_lock_minutes,
            } => {
                let minutes = auto_lock_minutes.unwrap_or(self.settings().default_auto_lock_minutes);
                // Flush pending changes so the seal on lock covers them
                if let Some(storage) = &self.storage {
                    storage.save()?;
                }
                self.vault.enable(password.as_str(), minutes)?;
                self.set_idle_minutes(minutes);
                Ok(VaultResponse::Done)
            }

            VaultCommand::Disable { password } => {
                if let Some(storage) = &self.storage {
                    let bound =
                        HouseholdService::new(storage, self.settings()).vault_keyed_members()?;
                    if !bound.is_empty() {
                        let names: Vec<_> = bound.iter().map(|u| u.name.as_str()).collect();
                        return Err(HearthError::Validation(format!(
                            "Records of {} are unlocked by the vault password; move them to a member password first",
                            names.join(", ")
                        )));
                    }
                    storage.save()?;
                }
                self.vault.disable(password.as_str())?;
                self.set_idle_minutes(0);
                Ok(VaultResponse::Done)
            }

            VaultCommand::ChangePassword { current, new } => {
                self.change_password(current.as_str(), new.as_str())?;
                Ok(VaultResponse::Done)
            }

            VaultCommand::UpdateAutoLock { minutes } => {
                self.vault.update_auto_lock(minutes)?;
                self.set_idle_minutes(minutes);
                Ok(VaultResponse::Done)
            }

            VaultCommand::Lock => {
                if !self.vault.is_enabled() {
                    return Err(HearthError::VaultNotEnabled);
                }
                self.lock_now(LockReason::Manual)?;
                Ok(VaultResponse::Done)
            }

            VaultCommand::Unlock { password } => {
                if self.vault.is_unlocked() {
                    return Ok(VaultResponse::Unlocked(true));
                }
                let unlocked = self.unlock_with(password.as_str())?;
                if !unlocked {
                    warn!("Vault unlock rejected");
                }
                Ok(VaultResponse::Unlocked(unlocked))
            }
        }
    }

    /// Change the vault password along with every keyring it unlocks
    ///
    /// Keyrings are re-wrapped in memory first. If any step fails the store
    /// is reloaded from disk, dropping the re-wraps.
    fn change_password(&mut self, current: &str, new: &str) -> HearthResult<()> {
        if !self.vault.verify_password(current)? {
            return Err(HearthError::WrongPassword);
        }

        if let Some(storage) = &self.storage {
            storage.save()?;
        }
        match self.rewrap_and_change(current, new) {
            Ok(rewrapped) => {
                if let Some(storage) = &self.storage {
                    storage.save()?;
                }
                info!(rewrapped, "Vault password changed");
                Ok(())
            }
            Err(e) => {
                if let Some(storage) = &self.storage {
                    storage.load()?;
                }
                warn!(error = %e, "Vault password change rolled back");
                Err(e)
            }
        }
    }

    fn rewrap_and_change(&mut self, current: &str, new: &str) -> HearthResult<usize> {
        let rewrapped = match &self.storage {
            Some(storage) => HouseholdService::new(storage, self.settings())
                .rewrap_vault_members(current, new)?,
            None => 0,
        };
        self.vault.change_password(current, new)?;
        Ok(rewrapped)
    }
}
