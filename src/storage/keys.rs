//! Wrapped data-encryption key repository
//!
//! One row per (owner, entity type, holder). The owner's own copy has
//! `holder_id == owner_id`; every other row is a copy sealed to a recipient.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::SealedKey;
use crate::error::HearthError;
use crate::models::{EntityType, UserId};

/// A DEK sealed to one holder's public key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedDek {
    pub owner_id: UserId,
    pub entity_type: EntityType,
    pub holder_id: UserId,
    pub sealed: SealedKey,
    pub created_at: DateTime<Utc>,
}

impl WrappedDek {
    pub fn new(owner_id: UserId, entity_type: EntityType, holder_id: UserId, sealed: SealedKey) -> Self {
        Self {
            owner_id,
            entity_type,
            holder_id,
            sealed,
            created_at: Utc::now(),
        }
    }

    /// Whether this is the owner's own copy
    pub fn is_owner_copy(&self) -> bool {
        self.owner_id == self.holder_id
    }
}

type KeySlot = (UserId, EntityType, UserId);

/// Repository for wrapped DEKs
pub struct KeyRepository {
    data: RwLock<HashMap<KeySlot, WrappedDek>>,
}

impl KeyRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<KeySlot, WrappedDek>>, HearthError> {
        self.data
            .read()
            .map_err(|e| HearthError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<KeySlot, WrappedDek>>, HearthError> {
        self.data
            .write()
            .map_err(|e| HearthError::Storage(format!("Failed to acquire write lock: {}", e)))
    }

    /// Replace the contents with keys loaded from disk
    pub fn replace_all(&self, keys: Vec<WrappedDek>) -> Result<(), HearthError> {
        let mut data = self.write()?;
        data.clear();
        for key in keys {
            data.insert((key.owner_id, key.entity_type, key.holder_id), key);
        }
        Ok(())
    }

    /// Get the copy held by `holder_id`
    pub fn get(
        &self,
        owner_id: UserId,
        entity_type: EntityType,
        holder_id: UserId,
    ) -> Result<Option<WrappedDek>, HearthError> {
        Ok(self.read()?.get(&(owner_id, entity_type, holder_id)).cloned())
    }

    /// All copies, in a stable order for persistence
    pub fn get_all(&self) -> Result<Vec<WrappedDek>, HearthError> {
        let mut keys: Vec<_> = self.read()?.values().cloned().collect();
        keys.sort_by(|a, b| {
            (a.owner_id, a.entity_type.as_str(), a.holder_id)
                .cmp(&(b.owner_id, b.entity_type.as_str(), b.holder_id))
        });
        Ok(keys)
    }

    /// Every copy of one owner's DEK for a type, owner copy included
    pub fn holders_of(
        &self,
        owner_id: UserId,
        entity_type: EntityType,
    ) -> Result<Vec<UserId>, HearthError> {
        Ok(self
            .read()?
            .values()
            .filter(|k| k.owner_id == owner_id && k.entity_type == entity_type)
            .map(|k| k.holder_id)
            .collect())
    }

    /// Entity types for which `owner_id` has a DEK
    pub fn types_for_owner(&self, owner_id: UserId) -> Result<Vec<EntityType>, HearthError> {
        let mut types: Vec<_> = self
            .read()?
            .values()
            .filter(|k| k.owner_id == owner_id && k.is_owner_copy())
            .map(|k| k.entity_type)
            .collect();
        types.sort_by_key(|t| t.as_str());
        Ok(types)
    }

    /// Insert or replace a copy
    pub fn upsert(&self, key: WrappedDek) -> Result<(), HearthError> {
        self.write()?
            .insert((key.owner_id, key.entity_type, key.holder_id), key);
        Ok(())
    }

    /// Delete the copy held by `holder_id`
    pub fn delete(
        &self,
        owner_id: UserId,
        entity_type: EntityType,
        holder_id: UserId,
    ) -> Result<bool, HearthError> {
        Ok(self
            .write()?
            .remove(&(owner_id, entity_type, holder_id))
            .is_some())
    }

    /// Count stored copies
    pub fn count(&self) -> Result<usize, HearthError> {
        Ok(self.read()?.len())
    }
}

impl Default for KeyRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{seal_key, MemberKeyPair, SecretKey};

    fn sealed_for(pair: &MemberKeyPair) -> SealedKey {
        seal_key(&SecretKey::generate(), &pair.public).unwrap()
    }

    #[test]
    fn test_slots_are_per_holder() {
        let repo = KeyRepository::new();
        let owner = UserId::new();
        let recipient = UserId::new();
        let pair = MemberKeyPair::generate();

        repo.upsert(WrappedDek::new(owner, EntityType::Account, owner, sealed_for(&pair)))
            .unwrap();
        repo.upsert(WrappedDek::new(owner, EntityType::Account, recipient, sealed_for(&pair)))
            .unwrap();

        assert_eq!(repo.count().unwrap(), 2);
        assert_eq!(repo.holders_of(owner, EntityType::Account).unwrap().len(), 2);
        assert_eq!(repo.types_for_owner(owner).unwrap(), vec![EntityType::Account]);
        assert!(repo.types_for_owner(recipient).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_only_that_holder() {
        let repo = KeyRepository::new();
        let owner = UserId::new();
        let recipient = UserId::new();
        let pair = MemberKeyPair::generate();

        repo.upsert(WrappedDek::new(owner, EntityType::Goal, owner, sealed_for(&pair)))
            .unwrap();
        repo.upsert(WrappedDek::new(owner, EntityType::Goal, recipient, sealed_for(&pair)))
            .unwrap();

        assert!(repo.delete(owner, EntityType::Goal, recipient).unwrap());
        assert!(!repo.delete(owner, EntityType::Goal, recipient).unwrap());
        assert!(repo.get(owner, EntityType::Goal, owner).unwrap().is_some());
    }
}
