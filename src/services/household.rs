//! Household member service
//!
//! Member creation, member passwords, and turning on record encryption.

use chrono::Utc;
use tracing::info;

use crate::config::Settings;
use crate::crypto::{hash_member_password, verify_member_password};
use crate::entity::{EntityKeyStore, UserSession};
use crate::error::{HearthError, HearthResult};
use crate::models::{HouseholdUser, KeySource, UserId};
use crate::storage::Storage;
use crate::vault::VaultManager;

/// Service for household members
pub struct HouseholdService<'a> {
    storage: &'a Storage,
    settings: &'a Settings,
}

impl<'a> HouseholdService<'a> {
    pub fn new(storage: &'a Storage, settings: &'a Settings) -> Self {
        Self { storage, settings }
    }

    /// Add a member to the household
    pub fn create_member(&self, name: &str, color: Option<String>) -> HearthResult<HouseholdUser> {
        let name = name.trim();
        if self.storage.users.name_exists(name, None)? {
            return Err(HearthError::Duplicate {
                entity_type: "User",
                identifier: name.to_string(),
            });
        }

        let mut user = HouseholdUser::new(name);
        user.color = color;
        user.validate().map_err(HearthError::Validation)?;

        self.storage.users.upsert(user.clone())?;
        self.storage.save()?;
        info!(user = %user.id, "Added household member");
        Ok(user)
    }

    pub fn list_members(&self) -> HearthResult<Vec<HouseholdUser>> {
        self.storage.users.get_all()
    }

    /// Find a member by name or ID string
    pub fn find_member(&self, identifier: &str) -> HearthResult<Option<HouseholdUser>> {
        if let Some(user) = self.storage.users.get_by_name(identifier)? {
            return Ok(Some(user));
        }
        if let Ok(id) = identifier.parse::<UserId>() {
            return self.storage.users.get(id);
        }
        Ok(None)
    }

    fn check_length(&self, password: &str) -> HearthResult<()> {
        if password.chars().count() < self.settings.min_password_length {
            return Err(HearthError::Validation(format!(
                "Password must be at least {} characters",
                self.settings.min_password_length
            )));
        }
        Ok(())
    }

    /// Set or replace a member password
    ///
    /// Replacing requires the current password. A keyring unlocked by the
    /// member password is re-wrapped under the new one.
    pub fn set_member_password(
        &self,
        user_id: UserId,
        current: Option<&str>,
        new: &str,
    ) -> HearthResult<()> {
        self.check_length(new)?;
        let user = self.storage.users.require(user_id)?;

        if let Some(hash) = &user.password_hash {
            let current = current.ok_or(HearthError::WrongPassword)?;
            if !verify_member_password(current, hash)? {
                return Err(HearthError::WrongPassword);
            }
            if let Some(keyring) = &user.keyring {
                if keyring.key_source == KeySource::Member {
                    EntityKeyStore::new(self.storage).rewrap_member(
                        user_id,
                        current,
                        new,
                        KeySource::Member,
                    )?;
                }
            }
        }

        // Re-read: the keyring may have just been re-wrapped
        let mut user = self.storage.users.require(user_id)?;
        user.password_hash = Some(hash_member_password(new, &self.settings.member_hash)?);
        user.updated_at = Utc::now();
        self.storage.users.upsert(user)?;
        self.storage.save()?;
        info!(user = %user_id, "Member password set");
        Ok(())
    }

    /// Check a member password
    pub fn verify_member_password(&self, user_id: UserId, candidate: &str) -> HearthResult<bool> {
        let user = self.storage.users.require(user_id)?;
        match &user.password_hash {
            Some(hash) => verify_member_password(candidate, hash),
            None => Ok(false),
        }
    }

    /// Turn on record encryption for a member
    ///
    /// `secret` is the member password for [`KeySource::Member`] or the vault
    /// password for [`KeySource::Vault`]; either is verified first.
    pub fn enable_record_encryption(
        &self,
        user_id: UserId,
        source: KeySource,
        secret: &str,
        vault: &VaultManager,
    ) -> HearthResult<()> {
        let verified = match source {
            KeySource::Member => self.verify_member_password(user_id, secret)?,
            KeySource::Vault => vault.verify_password(secret)?,
        };
        if !verified {
            return Err(HearthError::WrongPassword);
        }

        EntityKeyStore::new(self.storage).provision_member(
            user_id,
            secret,
            source,
            self.settings.kdf_iterations,
        )?;
        self.storage.save()?;
        Ok(())
    }

    /// Open a member session with the member's unlock secret
    pub fn open_session(&self, user_id: UserId, secret: &str) -> HearthResult<UserSession> {
        EntityKeyStore::new(self.storage).open_session(user_id, secret)
    }

    /// Members whose keyring is unlocked by the vault password
    pub fn vault_keyed_members(&self) -> HearthResult<Vec<HouseholdUser>> {
        Ok(self
            .storage
            .users
            .get_all()?
            .into_iter()
            .filter(|u| u.keyring.as_ref().is_some_and(|k| k.key_source == KeySource::Vault))
            .collect())
    }

    /// Re-wrap every keyring unlocked by the vault password
    ///
    /// Changes are in memory only; the caller saves once the vault password
    /// change has gone through. A keyring that `old_password` does not open
    /// fails the whole batch.
    pub fn rewrap_vault_members(&self, old_password: &str, new_password: &str) -> HearthResult<usize> {
        let keys = EntityKeyStore::new(self.storage);
        let members = self.vault_keyed_members()?;
        for user in &members {
            keys.rewrap_member(user.id, old_password, new_password, KeySource::Vault)
                .map_err(|e| match e {
                    HearthError::WrongPassword => HearthError::Validation(format!(
                        "The keyring of {} is not bound to the current vault password",
                        user.name
                    )),
                    other => other,
                })?;
        }
        if !members.is_empty() {
            info!(members = members.len(), "Re-wrapped vault-keyed members");
        }
        Ok(members.len())
    }

    /// Move a vault-keyed keyring onto the member's own password
    ///
    /// Both passwords are verified before the keyring is re-wrapped.
    pub fn move_to_member_password(
        &self,
        user_id: UserId,
        vault_password: &str,
        member_password: &str,
        vault: &VaultManager,
    ) -> HearthResult<()> {
        let user = self.storage.users.require(user_id)?;
        match user.keyring.as_ref().map(|k| k.key_source) {
            Some(KeySource::Vault) => {}
            Some(KeySource::Member) => {
                return Err(HearthError::Validation(format!(
                    "{} already unlocks records with a member password",
                    user.name
                )))
            }
            None => {
                return Err(HearthError::Validation(format!(
                    "{} does not encrypt records",
                    user.name
                )))
            }
        }
        if !user.has_password() {
            return Err(HearthError::Validation(format!(
                "{} has no member password; set one first",
                user.name
            )));
        }
        if !vault.verify_password(vault_password)?
            || !self.verify_member_password(user_id, member_password)?
        {
            return Err(HearthError::WrongPassword);
        }

        EntityKeyStore::new(self.storage).rewrap_member(
            user_id,
            vault_password,
            member_password,
            KeySource::Member,
        )?;
        self.storage.save()?;
        info!(user = %user_id, "Keyring moved to member password");
        Ok(())
    }
}
