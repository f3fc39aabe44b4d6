//! Entity record service
//!
//! Every read and write goes through the encryption middleware. Aggregations
//! check and decrypt each record on its own.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::sharing::SharingService;
use crate::entity::{EncryptionMiddleware, SharingAuthorizer, UserSession};
use crate::error::{HearthError, HearthResult};
use crate::models::{Capability, EntityRecord, EntityType, RecordId, UserId};
use crate::storage::Storage;

/// Service for entity records
pub struct RecordService<'a> {
    storage: &'a Storage,
}

impl<'a> RecordService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn require_record(&self, id: RecordId) -> HearthResult<EntityRecord> {
        self.storage
            .records
            .get(id)?
            .ok_or_else(|| HearthError::record_not_found(id.to_string()))
    }

    /// Create a record owned by `owner_id`
    ///
    /// Matching sharing defaults are applied after the record is stored.
    /// Returns the record as persisted.
    pub fn create(
        &self,
        owner_id: UserId,
        owner_session: Option<&UserSession>,
        entity_type: EntityType,
        fields: BTreeMap<String, Value>,
    ) -> HearthResult<EntityRecord> {
        self.storage.users.require(owner_id)?;
        let record = EntityRecord::new(owner_id, entity_type, fields);
        let stored = EncryptionMiddleware::new(self.storage).on_write(record, owner_session)?;
        self.storage.records.upsert(stored.clone())?;

        let created = SharingAuthorizer::new(self.storage).apply_default_on_create(
            owner_id,
            entity_type,
            stored.id,
        )?;
        let sharing = SharingService::new(self.storage);
        for share in &created {
            if self.storage.keys.get(owner_id, entity_type, share.recipient_id)?.is_none() {
                sharing.distribute_keys(owner_id, share.recipient_id, &[entity_type], owner_session)?;
            }
        }

        self.storage.save()?;
        debug!(record = %stored.id, %entity_type, defaults = created.len(), "Created record");
        Ok(stored)
    }

    /// Fetch and decrypt one record for `viewer_id`
    pub fn get(
        &self,
        viewer_id: UserId,
        viewer_session: Option<&UserSession>,
        id: RecordId,
    ) -> HearthResult<EntityRecord> {
        let record = self.require_record(id)?;
        EncryptionMiddleware::new(self.storage).on_read(
            record,
            viewer_id,
            viewer_session,
            Capability::View,
        )
    }

    /// Every record `viewer_id` may view, optionally of one type
    ///
    /// Records without a view grant are left out rather than failing the list.
    pub fn list_visible(
        &self,
        viewer_id: UserId,
        viewer_session: Option<&UserSession>,
        entity_type: Option<EntityType>,
    ) -> HearthResult<Vec<EntityRecord>> {
        let records = match entity_type {
            Some(t) => self.storage.records.get_by_type(t)?,
            None => self.storage.records.get_all()?,
        };

        let middleware = EncryptionMiddleware::new(self.storage);
        let mut visible = Vec::new();
        for record in records {
            match middleware.on_read(record, viewer_id, viewer_session, Capability::View) {
                Ok(record) => visible.push(record),
                Err(e) if e.is_access_denied() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(visible)
    }

    /// Merge `changes` into a record; owner only
    ///
    /// A `null` value removes the field.
    pub fn update(
        &self,
        owner_id: UserId,
        owner_session: Option<&UserSession>,
        id: RecordId,
        changes: BTreeMap<String, Value>,
    ) -> HearthResult<EntityRecord> {
        let record = self.require_record(id)?;
        if record.owner_id() != owner_id {
            return Err(HearthError::NotAuthorized(
                "only the owner can edit this record".into(),
            ));
        }

        let middleware = EncryptionMiddleware::new(self.storage);
        let mut record = middleware.on_read(record, owner_id, owner_session, Capability::View)?;
        for (field, value) in changes {
            if value.is_null() {
                record.fields.remove(&field);
            } else {
                record.fields.insert(field, value);
            }
        }
        record.touch();

        let stored = middleware.on_write(record, owner_session)?;
        self.storage.records.upsert(stored.clone())?;
        self.storage.save()?;
        Ok(stored)
    }

    /// Delete a record and the shares materialized for it; owner only
    pub fn delete(&self, owner_id: UserId, id: RecordId) -> HearthResult<()> {
        let record = self.require_record(id)?;
        if record.owner_id() != owner_id {
            return Err(HearthError::NotAuthorized(
                "only the owner can delete this record".into(),
            ));
        }

        self.storage.records.delete(id)?;
        for share in self.storage.shares.shares_by_owner(owner_id)? {
            if share.entity_id == Some(id) {
                self.storage.shares.delete_share(share.id)?;
            }
        }
        self.storage.save()?;
        Ok(())
    }

    fn records_for(
        &self,
        owner_ids: &[UserId],
        entity_type: EntityType,
    ) -> HearthResult<Vec<EntityRecord>> {
        Ok(self
            .storage
            .records
            .get_by_type(entity_type)?
            .into_iter()
            .filter(|r| owner_ids.contains(&r.owner_id()))
            .collect())
    }

    /// Household total of an integer field across the given owners' records
    ///
    /// Every included record must grant `combine` to the viewer.
    pub fn combine_total(
        &self,
        viewer_id: UserId,
        viewer_session: Option<&UserSession>,
        owner_ids: &[UserId],
        entity_type: EntityType,
        field: &str,
    ) -> HearthResult<i64> {
        let middleware = EncryptionMiddleware::new(self.storage);
        let mut total: i64 = 0;
        for record in self.records_for(owner_ids, entity_type)? {
            let record =
                middleware.on_read(record, viewer_id, viewer_session, Capability::Combine)?;
            total = total.saturating_add(record.amount(field).unwrap_or(0));
        }
        Ok(total)
    }

    /// Decrypted records for a report across the given owners
    ///
    /// Every included record must grant `reports` to the viewer.
    pub fn report(
        &self,
        viewer_id: UserId,
        viewer_session: Option<&UserSession>,
        owner_ids: &[UserId],
        entity_type: EntityType,
    ) -> HearthResult<Vec<EntityRecord>> {
        let middleware = EncryptionMiddleware::new(self.storage);
        self.records_for(owner_ids, entity_type)?
            .into_iter()
            .map(|record| middleware.on_read(record, viewer_id, viewer_session, Capability::Reports))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKeyStore;
    use crate::models::{HouseholdUser, KeySource, SharePermissions, ShareScope};
    use serde_json::json;
    use tempfile::TempDir;

    struct Household {
        _tmp: TempDir,
        storage: Storage,
        alex: UserId,
        jordan: UserId,
    }

    fn household() -> Household {
        let tmp = TempDir::new().unwrap();
        let storage = Storage::new(tmp.path().join("household.json"));
        let alex = HouseholdUser::new("Alex");
        let jordan = HouseholdUser::new("Jordan");
        let (alex_id, jordan_id) = (alex.id, jordan.id);
        storage.users.upsert(alex).unwrap();
        storage.users.upsert(jordan).unwrap();

        let keys = EntityKeyStore::new(&storage);
        keys.provision_member(alex_id, "alex-secret", KeySource::Member, 1_000)
            .unwrap();
        keys.provision_member(jordan_id, "jordan-secret", KeySource::Member, 1_000)
            .unwrap();

        Household {
            _tmp: tmp,
            storage,
            alex: alex_id,
            jordan: jordan_id,
        }
    }

    fn balance(amount: i64) -> BTreeMap<String, Value> {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), json!("Checking"));
        fields.insert("balance".to_string(), json!(amount));
        fields
    }

    #[test]
    fn test_create_persists_ciphertext() {
        let h = household();
        let session = EntityKeyStore::new(&h.storage)
            .open_session(h.alex, "alex-secret")
            .unwrap();
        let service = RecordService::new(&h.storage);

        let stored = service
            .create(h.alex, Some(&session), EntityType::Account, balance(1_000))
            .unwrap();
        assert!(stored.is_encrypted);

        let raw = std::fs::read_to_string(h.storage.path()).unwrap();
        assert!(!raw.contains("Checking"));

        let read = service.get(h.alex, Some(&session), stored.id).unwrap();
        assert_eq!(read.amount("balance"), Some(1_000));
    }

    #[test]
    fn test_default_applies_to_new_records() {
        let h = household();
        let keys = EntityKeyStore::new(&h.storage);
        let alex_session = keys.open_session(h.alex, "alex-secret").unwrap();
        let jordan_session = keys.open_session(h.jordan, "jordan-secret").unwrap();
        SharingService::new(&h.storage)
            .set_default(
                h.alex,
                h.jordan,
                EntityType::Account.into(),
                SharePermissions::VIEW_ONLY,
            )
            .unwrap();

        let service = RecordService::new(&h.storage);
        let stored = service
            .create(h.alex, Some(&alex_session), EntityType::Account, balance(500))
            .unwrap();

        let read = service.get(h.jordan, Some(&jordan_session), stored.id).unwrap();
        assert_eq!(read.amount("balance"), Some(500));
        // Record-level share does not reach other records
        let private = service
            .create(h.alex, Some(&alex_session), EntityType::Goal, BTreeMap::new())
            .unwrap();
        assert!(service
            .get(h.jordan, Some(&jordan_session), private.id)
            .unwrap_err()
            .is_access_denied());
    }

    #[test]
    fn test_list_visible_skips_unshared() {
        let h = household();
        let keys = EntityKeyStore::new(&h.storage);
        let alex_session = keys.open_session(h.alex, "alex-secret").unwrap();
        let jordan_session = keys.open_session(h.jordan, "jordan-secret").unwrap();
        let service = RecordService::new(&h.storage);

        service
            .create(h.alex, Some(&alex_session), EntityType::Account, balance(1))
            .unwrap();
        service
            .create(h.jordan, Some(&jordan_session), EntityType::Account, balance(2))
            .unwrap();

        let visible = service
            .list_visible(h.jordan, Some(&jordan_session), None)
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].owner_id(), h.jordan);
    }

    #[test]
    fn test_combine_requires_permission_on_every_record() {
        let h = household();
        let keys = EntityKeyStore::new(&h.storage);
        let alex_session = keys.open_session(h.alex, "alex-secret").unwrap();
        let jordan_session = keys.open_session(h.jordan, "jordan-secret").unwrap();
        let service = RecordService::new(&h.storage);
        let sharing = SharingService::new(&h.storage);

        service
            .create(h.alex, Some(&alex_session), EntityType::Account, balance(300))
            .unwrap();
        service
            .create(h.jordan, Some(&jordan_session), EntityType::Account, balance(200))
            .unwrap();
        let share = sharing
            .share(
                h.alex,
                h.jordan,
                ShareScope::All,
                SharePermissions::VIEW_ONLY,
                Some(&alex_session),
            )
            .unwrap();

        let owners = [h.alex, h.jordan];
        assert!(service
            .combine_total(h.jordan, Some(&jordan_session), &owners, EntityType::Account, "balance")
            .unwrap_err()
            .is_access_denied());

        sharing
            .update_share(h.alex, share.id, SharePermissions::FULL)
            .unwrap();
        let total = service
            .combine_total(h.jordan, Some(&jordan_session), &owners, EntityType::Account, "balance")
            .unwrap();
        assert_eq!(total, 500);
        assert_eq!(
            service
                .report(h.jordan, Some(&jordan_session), &owners, EntityType::Account)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_update_and_delete_are_owner_only() {
        let h = household();
        let keys = EntityKeyStore::new(&h.storage);
        let alex_session = keys.open_session(h.alex, "alex-secret").unwrap();
        let jordan_session = keys.open_session(h.jordan, "jordan-secret").unwrap();
        let service = RecordService::new(&h.storage);
        let stored = service
            .create(h.alex, Some(&alex_session), EntityType::Account, balance(10))
            .unwrap();

        let mut changes = BTreeMap::new();
        changes.insert("balance".to_string(), json!(99));
        assert!(service
            .update(h.jordan, Some(&jordan_session), stored.id, changes.clone())
            .unwrap_err()
            .is_access_denied());

        let updated = service
            .update(h.alex, Some(&alex_session), stored.id, changes)
            .unwrap();
        assert!(updated.is_encrypted);
        let read = service.get(h.alex, Some(&alex_session), stored.id).unwrap();
        assert_eq!(read.amount("balance"), Some(99));
        assert_eq!(read.field("name"), Some(&json!("Checking")));

        assert!(service
            .delete(h.jordan, stored.id)
            .unwrap_err()
            .is_access_denied());
        service.delete(h.alex, stored.id).unwrap();
        assert!(service
            .get(h.alex, Some(&alex_session), stored.id)
            .unwrap_err()
            .is_not_found());
    }
}
