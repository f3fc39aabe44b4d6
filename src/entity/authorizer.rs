//! Share-based authorization
//!
//! Decides what a viewer may do with another member's records and turns
//! sharing defaults into concrete shares as records are created.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{HearthError, HearthResult};
use crate::models::{
    Capability, DataShare, EntityType, RecordId, SharePermissions, ShareScope, SharingDefault,
    UserId,
};
use crate::storage::Storage;

pub struct SharingAuthorizer<'a> {
    storage: &'a Storage,
}

impl<'a> SharingAuthorizer<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Permissions `viewer_id` holds on the owner's records
    ///
    /// The owner always holds every permission. For anyone else the most
    /// specific share wins: record, then entity type, then `all`.
    pub fn can_decrypt(
        &self,
        owner_id: UserId,
        entity_type: EntityType,
        entity_id: Option<RecordId>,
        viewer_id: UserId,
    ) -> HearthResult<Option<SharePermissions>> {
        if owner_id == viewer_id {
            return Ok(Some(SharePermissions::FULL));
        }

        let best = self
            .storage
            .shares
            .shares_between(owner_id, viewer_id)?
            .into_iter()
            .filter_map(|share| {
                share
                    .specificity(entity_type, entity_id)
                    .map(|rank| (rank, share.permissions))
            })
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, permissions)| permissions);

        Ok(best)
    }

    /// Like [`can_decrypt`](Self::can_decrypt) but fails unless `capability` is granted
    pub fn require(
        &self,
        owner_id: UserId,
        entity_type: EntityType,
        entity_id: Option<RecordId>,
        viewer_id: UserId,
        capability: Capability,
    ) -> HearthResult<SharePermissions> {
        match self.can_decrypt(owner_id, entity_type, entity_id, viewer_id)? {
            Some(permissions) if permissions.allows(capability) => Ok(permissions),
            Some(_) => Err(HearthError::NotAuthorized(format!(
                "share does not grant {} on {} records",
                capability, entity_type
            ))),
            None => Err(HearthError::NotAuthorized(format!(
                "no share covers these {} records",
                entity_type
            ))),
        }
    }

    /// Materialize record-level shares from the owner's matching defaults
    ///
    /// Per recipient, an exact entity-type default is preferred over an `all`
    /// default. Returns the shares created.
    pub fn apply_default_on_create(
        &self,
        owner_id: UserId,
        entity_type: EntityType,
        new_entity_id: RecordId,
    ) -> HearthResult<Vec<DataShare>> {
        let mut chosen: BTreeMap<UserId, SharingDefault> = BTreeMap::new();
        for default in self.storage.shares.defaults_by_owner(owner_id)? {
            if !default.entity_type.covers(entity_type) {
                continue;
            }
            let replace = match chosen.get(&default.recipient_id) {
                None => true,
                Some(existing) => {
                    existing.entity_type == ShareScope::All && default.entity_type != ShareScope::All
                }
            };
            if replace {
                chosen.insert(default.recipient_id, default);
            }
        }

        let mut created = Vec::with_capacity(chosen.len());
        for (recipient_id, default) in chosen {
            let share = DataShare::for_entity(
                owner_id,
                recipient_id,
                entity_type,
                new_entity_id,
                default.permissions,
            );
            self.storage.shares.upsert_share(share.clone())?;
            debug!(
                owner = %owner_id,
                recipient = %recipient_id,
                record = %new_entity_id,
                "Applied sharing default"
            );
            created.push(share);
        }
        Ok(created)
    }
}
