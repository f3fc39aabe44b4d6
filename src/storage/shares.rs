//! Share and sharing-default repository

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::HearthError;
use crate::models::{DataShare, DefaultId, ShareId, ShareScope, SharingDefault, UserId};

/// Repository for data shares and sharing defaults
pub struct ShareRepository {
    shares: RwLock<HashMap<ShareId, DataShare>>,
    defaults: RwLock<HashMap<DefaultId, SharingDefault>>,
}

impl ShareRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            shares: RwLock::new(HashMap::new()),
            defaults: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the contents with data loaded from disk
    pub fn replace_all(
        &self,
        shares: Vec<DataShare>,
        defaults: Vec<SharingDefault>,
    ) -> Result<(), HearthError> {
        let mut share_data = self.shares.write().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut default_data = self.defaults.write().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        share_data.clear();
        for share in shares {
            share_data.insert(share.id, share);
        }
        default_data.clear();
        for default in defaults {
            default_data.insert(default.id, default);
        }
        Ok(())
    }

    // ---- shares ----

    /// Get a share by ID
    pub fn get_share(&self, id: ShareId) -> Result<Option<DataShare>, HearthError> {
        let data = self.shares.read().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(&id).cloned())
    }

    /// Get all shares, oldest first
    pub fn all_shares(&self) -> Result<Vec<DataShare>, HearthError> {
        let data = self.shares.read().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut shares: Vec<_> = data.values().cloned().collect();
        shares.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(shares)
    }

    /// Shares from `owner_id` to `recipient_id`
    pub fn shares_between(
        &self,
        owner_id: UserId,
        recipient_id: UserId,
    ) -> Result<Vec<DataShare>, HearthError> {
        Ok(self
            .all_shares()?
            .into_iter()
            .filter(|s| s.owner_id == owner_id && s.recipient_id == recipient_id)
            .collect())
    }

    /// Shares granted by an owner
    pub fn shares_by_owner(&self, owner_id: UserId) -> Result<Vec<DataShare>, HearthError> {
        Ok(self
            .all_shares()?
            .into_iter()
            .filter(|s| s.owner_id == owner_id)
            .collect())
    }

    /// Shares received by a recipient
    pub fn shares_for_recipient(&self, recipient_id: UserId) -> Result<Vec<DataShare>, HearthError> {
        Ok(self
            .all_shares()?
            .into_iter()
            .filter(|s| s.recipient_id == recipient_id)
            .collect())
    }

    /// Insert or update a share
    pub fn upsert_share(&self, share: DataShare) -> Result<(), HearthError> {
        let mut data = self.shares.write().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.insert(share.id, share);
        Ok(())
    }

    /// Delete a share
    pub fn delete_share(&self, id: ShareId) -> Result<bool, HearthError> {
        let mut data = self.shares.write().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(data.remove(&id).is_some())
    }

    // ---- defaults ----

    /// Get a sharing default by ID
    pub fn get_default(&self, id: DefaultId) -> Result<Option<SharingDefault>, HearthError> {
        let data = self.defaults.read().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(&id).cloned())
    }

    /// Get all sharing defaults, oldest first
    pub fn all_defaults(&self) -> Result<Vec<SharingDefault>, HearthError> {
        let data = self.defaults.read().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut defaults: Vec<_> = data.values().cloned().collect();
        defaults.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(defaults)
    }

    /// Defaults configured by an owner
    pub fn defaults_by_owner(&self, owner_id: UserId) -> Result<Vec<SharingDefault>, HearthError> {
        Ok(self
            .all_defaults()?
            .into_iter()
            .filter(|d| d.owner_id == owner_id)
            .collect())
    }

    /// The default for an exact (owner, recipient, type) tuple
    pub fn find_default(
        &self,
        owner_id: UserId,
        recipient_id: UserId,
        entity_type: ShareScope,
    ) -> Result<Option<SharingDefault>, HearthError> {
        Ok(self.all_defaults()?.into_iter().find(|d| {
            d.owner_id == owner_id && d.recipient_id == recipient_id && d.entity_type == entity_type
        }))
    }

    /// Insert or update a default
    ///
    /// Rejects a second default for the same (owner, recipient, type) tuple.
    pub fn upsert_default(&self, default: SharingDefault) -> Result<(), HearthError> {
        let mut data = self.defaults.write().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let clash = data.values().any(|d| {
            d.id != default.id
                && d.owner_id == default.owner_id
                && d.recipient_id == default.recipient_id
                && d.entity_type == default.entity_type
        });
        if clash {
            return Err(HearthError::Duplicate {
                entity_type: "Sharing default",
                identifier: format!(
                    "{} -> {} ({})",
                    default.owner_id, default.recipient_id, default.entity_type
                ),
            });
        }

        data.insert(default.id, default);
        Ok(())
    }

    /// Delete a default
    pub fn delete_default(&self, id: DefaultId) -> Result<bool, HearthError> {
        let mut data = self.defaults.write().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(data.remove(&id).is_some())
    }
}

impl Default for ShareRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, SharePermissions};

    #[test]
    fn test_share_queries() {
        let repo = ShareRepository::new();
        let owner = UserId::new();
        let recipient = UserId::new();

        let share = DataShare::new(owner, recipient, ShareScope::All, SharePermissions::VIEW_ONLY);
        let id = share.id;
        repo.upsert_share(share).unwrap();

        assert_eq!(repo.shares_between(owner, recipient).unwrap().len(), 1);
        assert!(repo.shares_between(recipient, owner).unwrap().is_empty());
        assert_eq!(repo.shares_for_recipient(recipient).unwrap().len(), 1);
        assert!(repo.delete_share(id).unwrap());
        assert!(repo.get_share(id).unwrap().is_none());
    }

    #[test]
    fn test_one_default_per_tuple() {
        let repo = ShareRepository::new();
        let owner = UserId::new();
        let recipient = UserId::new();
        let scope = ShareScope::Type(EntityType::Account);

        repo.upsert_default(SharingDefault::new(owner, recipient, scope, SharePermissions::FULL))
            .unwrap();
        let err = repo
            .upsert_default(SharingDefault::new(
                owner,
                recipient,
                scope,
                SharePermissions::VIEW_ONLY,
            ))
            .unwrap_err();
        assert!(matches!(err, HearthError::Duplicate { .. }));

        // Different type for the same pair is fine
        repo.upsert_default(SharingDefault::new(
            owner,
            recipient,
            ShareScope::All,
            SharePermissions::VIEW_ONLY,
        ))
        .unwrap();
        assert_eq!(repo.defaults_by_owner(owner).unwrap().len(), 2);
    }

    #[test]
    fn test_updating_existing_default_is_not_a_clash() {
        let repo = ShareRepository::new();
        let mut default = SharingDefault::new(
            UserId::new(),
            UserId::new(),
            ShareScope::All,
            SharePermissions::VIEW_ONLY,
        );
        repo.upsert_default(default.clone()).unwrap();

        default.permissions = SharePermissions::FULL;
        repo.upsert_default(default.clone()).unwrap();

        let stored = repo.get_default(default.id).unwrap().unwrap();
        assert!(stored.permissions.reports);
    }
}
