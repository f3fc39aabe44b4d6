//! Sharing service
//!
//! Explicit shares and sharing defaults. Only the owner may create, edit or
//! delete them. Granting access to an encrypting owner's data hands the
//! recipient a sealed copy of each covered DEK; revoking deletes it.

use chrono::Utc;
use tracing::info;

use crate::entity::{EntityKeyStore, UserSession};
use crate::error::{HearthError, HearthResult};
use crate::models::{
    DataShare, DefaultId, EntityType, ShareId, SharePermissions, ShareScope, SharingDefault, UserId,
};
use crate::storage::Storage;

/// Changes accepted by [`SharingService::update_default`]
#[derive(Debug, Clone, Default)]
pub struct DefaultUpdate {
    pub permissions: Option<SharePermissions>,
    pub entity_type: Option<ShareScope>,
}

/// Service for shares and sharing defaults
pub struct SharingService<'a> {
    storage: &'a Storage,
}

impl<'a> SharingService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn check_pair(&self, owner_id: UserId, recipient_id: UserId) -> HearthResult<()> {
        if owner_id == recipient_id {
            return Err(HearthError::Validation("cannot share with yourself".into()));
        }
        self.storage.users.require(owner_id)?;
        self.storage.users.require(recipient_id)?;
        Ok(())
    }

    fn check_owner(actor_id: UserId, owner_id: UserId, what: &str) -> HearthResult<()> {
        if actor_id != owner_id {
            return Err(HearthError::NotAuthorized(format!(
                "only the owner can change this {}",
                what
            )));
        }
        Ok(())
    }

    // ---- defaults ----

    /// Defaults configured by a member
    pub fn get_defaults(&self, user_id: UserId) -> HearthResult<Vec<SharingDefault>> {
        self.storage.shares.defaults_by_owner(user_id)
    }

    /// Create the default for (owner, recipient, type), or update its permissions
    pub fn set_default(
        &self,
        owner_id: UserId,
        recipient_id: UserId,
        entity_type: ShareScope,
        permissions: SharePermissions,
    ) -> HearthResult<SharingDefault> {
        self.check_pair(owner_id, recipient_id)?;

        let default = match self
            .storage
            .shares
            .find_default(owner_id, recipient_id, entity_type)?
        {
            Some(mut existing) => {
                existing.permissions = permissions;
                existing.updated_at = Utc::now();
                existing
            }
            None => SharingDefault::new(owner_id, recipient_id, entity_type, permissions),
        };

        self.storage.shares.upsert_default(default.clone())?;
        self.storage.save()?;
        info!(default = %default.id, scope = %entity_type, "Sharing default set");
        Ok(default)
    }

    /// Edit an existing default
    pub fn update_default(
        &self,
        actor_id: UserId,
        id: DefaultId,
        updates: DefaultUpdate,
    ) -> HearthResult<SharingDefault> {
        let mut default = self
            .storage
            .shares
            .get_default(id)?
            .ok_or_else(|| HearthError::default_not_found(id.to_string()))?;
        Self::check_owner(actor_id, default.owner_id, "sharing default")?;

        if let Some(permissions) = updates.permissions {
            default.permissions = permissions;
        }
        if let Some(entity_type) = updates.entity_type {
            default.entity_type = entity_type;
        }
        default.updated_at = Utc::now();

        self.storage.shares.upsert_default(default.clone())?;
        self.storage.save()?;
        Ok(default)
    }

    /// Delete a default; shares it already produced stay in place
    pub fn remove_default(&self, actor_id: UserId, id: DefaultId) -> HearthResult<()> {
        let default = self
            .storage
            .shares
            .get_default(id)?
            .ok_or_else(|| HearthError::default_not_found(id.to_string()))?;
        Self::check_owner(actor_id, default.owner_id, "sharing default")?;

        self.storage.shares.delete_default(id)?;
        self.storage.save()?;
        info!(default = %id, "Sharing default removed");
        Ok(())
    }

    // ---- shares ----

    /// Shares other members have granted to `viewer_id`
    pub fn get_shared_with_me(&self, viewer_id: UserId) -> HearthResult<Vec<DataShare>> {
        self.storage.shares.shares_for_recipient(viewer_id)
    }

    /// Shares a member has granted
    pub fn get_shared_by_me(&self, owner_id: UserId) -> HearthResult<Vec<DataShare>> {
        self.storage.shares.shares_by_owner(owner_id)
    }

    /// Grant `recipient_id` access to the owner's records in `scope`
    ///
    /// An existing scope-level share for the same pair and scope is updated
    /// instead of duplicated. For an encrypting owner the owner's session is
    /// required and the recipient must have record encryption enabled.
    pub fn share(
        &self,
        owner_id: UserId,
        recipient_id: UserId,
        scope: ShareScope,
        permissions: SharePermissions,
        owner_session: Option<&UserSession>,
    ) -> HearthResult<DataShare> {
        self.check_pair(owner_id, recipient_id)?;

        let existing = self
            .storage
            .shares
            .shares_between(owner_id, recipient_id)?
            .into_iter()
            .find(|s| s.entity_id.is_none() && s.scope == scope);
        let share = match existing {
            Some(mut share) => {
                share.permissions = permissions;
                share.updated_at = Utc::now();
                share
            }
            None => DataShare::new(owner_id, recipient_id, scope, permissions),
        };

        let covered: Vec<EntityType> = EntityType::ALL
            .iter()
            .copied()
            .filter(|t| scope.covers(*t))
            .collect();
        self.distribute_keys(owner_id, recipient_id, &covered, owner_session)?;

        self.storage.shares.upsert_share(share.clone())?;
        self.storage.save()?;
        info!(share = %share.id, %scope, "Share granted");
        Ok(share)
    }

    /// Seal the owner's existing DEKs for `types` to the recipient
    pub(crate) fn distribute_keys(
        &self,
        owner_id: UserId,
        recipient_id: UserId,
        types: &[EntityType],
        owner_session: Option<&UserSession>,
    ) -> HearthResult<()> {
        let owner = self.storage.users.require(owner_id)?;
        if !owner.encrypts_records() {
            return Ok(());
        }

        let keys = EntityKeyStore::new(self.storage);
        let recipient_public = keys.public_key_of(recipient_id)?.ok_or_else(|| {
            HearthError::Validation(
                "recipient must enable record encryption to receive encrypted records".into(),
            )
        })?;
        let session = owner_session.ok_or_else(|| {
            HearthError::NotAuthorized(format!("{} must unlock their records to share", owner.name))
        })?;

        let existing = self.storage.keys.types_for_owner(owner_id)?;
        for entity_type in types.iter().filter(|t| existing.contains(t)) {
            if self
                .storage
                .keys
                .get(owner_id, *entity_type, recipient_id)?
                .is_some()
            {
                continue;
            }
            let dek = keys.get_owner_dek(owner_id, *entity_type, session)?;
            keys.wrap_for_recipient(&dek, owner_id, *entity_type, recipient_id, &recipient_public)?;
        }
        Ok(())
    }

    /// Change the permissions on a share
    pub fn update_share(
        &self,
        actor_id: UserId,
        id: ShareId,
        permissions: SharePermissions,
    ) -> HearthResult<DataShare> {
        let mut share = self
            .storage
            .shares
            .get_share(id)?
            .ok_or_else(|| HearthError::share_not_found(id.to_string()))?;
        Self::check_owner(actor_id, share.owner_id, "share")?;

        share.permissions = permissions;
        share.updated_at = Utc::now();
        self.storage.shares.upsert_share(share.clone())?;
        self.storage.save()?;
        Ok(share)
    }

    /// Delete a share and any key copies no remaining share justifies
    pub fn revoke_share(&self, actor_id: UserId, id: ShareId) -> HearthResult<()> {
        let share = self
            .storage
            .shares
            .get_share(id)?
            .ok_or_else(|| HearthError::share_not_found(id.to_string()))?;
        Self::check_owner(actor_id, share.owner_id, "share")?;

        self.storage.shares.delete_share(id)?;

        let remaining = self
            .storage
            .shares
            .shares_between(share.owner_id, share.recipient_id)?;
        let keys = EntityKeyStore::new(self.storage);
        for entity_type in EntityType::ALL {
            if !share.scope.covers(entity_type) {
                continue;
            }
            if remaining.iter().any(|s| s.scope.covers(entity_type)) {
                continue;
            }
            keys.revoke(share.owner_id, entity_type, share.recipient_id)?;
        }

        self.storage.save()?;
        info!(share = %id, "Share revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HouseholdUser, KeySource};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("household.json"));
        (temp_dir, storage)
    }

    fn add_member(storage: &Storage, name: &str) -> UserId {
        let user = HouseholdUser::new(name);
        let id = user.id;
        storage.users.upsert(user).unwrap();
        id
    }

    #[test]
    fn test_set_default_upserts() {
        let (_tmp, storage) = setup();
        let alex = add_member(&storage, "Alex");
        let jordan = add_member(&storage, "Jordan");
        let service = SharingService::new(&storage);

        let first = service
            .set_default(alex, jordan, ShareScope::All, SharePermissions::VIEW_ONLY)
            .unwrap();
        let second = service
            .set_default(alex, jordan, ShareScope::All, SharePermissions::FULL)
            .unwrap();

        assert_eq!(first.id, second.id);
        let defaults = service.get_defaults(alex).unwrap();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].permissions, SharePermissions::FULL);
    }

    #[test]
    fn test_update_and_remove_default_are_owner_only() {
        let (_tmp, storage) = setup();
        let alex = add_member(&storage, "Alex");
        let jordan = add_member(&storage, "Jordan");
        let service = SharingService::new(&storage);
        let default = service
            .set_default(alex, jordan, EntityType::Goal.into(), SharePermissions::VIEW_ONLY)
            .unwrap();

        let updates = DefaultUpdate {
            permissions: Some(SharePermissions::FULL),
            ..DefaultUpdate::default()
        };
        assert!(service
            .update_default(jordan, default.id, updates.clone())
            .unwrap_err()
            .is_access_denied());
        let updated = service.update_default(alex, default.id, updates).unwrap();
        assert!(updated.permissions.combine);

        assert!(service
            .remove_default(jordan, default.id)
            .unwrap_err()
            .is_access_denied());
        service.remove_default(alex, default.id).unwrap();
        assert!(service.get_defaults(alex).unwrap().is_empty());
        assert!(service
            .remove_default(alex, default.id)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_cannot_share_with_self() {
        let (_tmp, storage) = setup();
        let alex = add_member(&storage, "Alex");
        let err = SharingService::new(&storage)
            .share(alex, alex, ShareScope::All, SharePermissions::FULL, None)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_share_update_and_revoke() {
        let (_tmp, storage) = setup();
        let alex = add_member(&storage, "Alex");
        let jordan = add_member(&storage, "Jordan");
        let service = SharingService::new(&storage);

        let share = service
            .share(alex, jordan, ShareScope::All, SharePermissions::VIEW_ONLY, None)
            .unwrap();
        assert_eq!(service.get_shared_with_me(jordan).unwrap().len(), 1);

        // Sharing the same scope again updates in place
        let again = service
            .share(alex, jordan, ShareScope::All, SharePermissions::FULL, None)
            .unwrap();
        assert_eq!(again.id, share.id);

        assert!(service
            .update_share(jordan, share.id, SharePermissions::VIEW_ONLY)
            .unwrap_err()
            .is_access_denied());
        assert!(service
            .revoke_share(jordan, share.id)
            .unwrap_err()
            .is_access_denied());

        service.revoke_share(alex, share.id).unwrap();
        assert!(service.get_shared_with_me(jordan).unwrap().is_empty());
    }

    #[test]
    fn test_encrypted_share_requires_recipient_keyring() {
        let (_tmp, storage) = setup();
        let alex = add_member(&storage, "Alex");
        let jordan = add_member(&storage, "Jordan");
        let keys = EntityKeyStore::new(&storage);
        keys.provision_member(alex, "alex-secret", KeySource::Member, 1_000)
            .unwrap();
        let session = keys.open_session(alex, "alex-secret").unwrap();

        let err = SharingService::new(&storage)
            .share(alex, jordan, ShareScope::All, SharePermissions::VIEW_ONLY, Some(&session))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_revoke_keeps_keys_still_covered_by_another_share() {
        let (_tmp, storage) = setup();
        let alex = add_member(&storage, "Alex");
        let jordan = add_member(&storage, "Jordan");
        let keys = EntityKeyStore::new(&storage);
        keys.provision_member(alex, "alex-secret", KeySource::Member, 1_000)
            .unwrap();
        keys.provision_member(jordan, "jordan-secret", KeySource::Member, 1_000)
            .unwrap();
        let alex_session = keys.open_session(alex, "alex-secret").unwrap();
        keys.get_owner_dek(alex, EntityType::Account, &alex_session)
            .unwrap();

        let service = SharingService::new(&storage);
        let all = service
            .share(
                alex,
                jordan,
                ShareScope::All,
                SharePermissions::VIEW_ONLY,
                Some(&alex_session),
            )
            .unwrap();
        let accounts = service
            .share(
                alex,
                jordan,
                EntityType::Account.into(),
                SharePermissions::VIEW_ONLY,
                Some(&alex_session),
            )
            .unwrap();

        service.revoke_share(alex, all.id).unwrap();
        assert!(storage
            .keys
            .get(alex, EntityType::Account, jordan)
            .unwrap()
            .is_some());

        service.revoke_share(alex, accounts.id).unwrap();
        assert!(storage
            .keys
            .get(alex, EntityType::Account, jordan)
            .unwrap()
            .is_none());
    }
}
