//! Member and record requests
//!
//! Thin guarded wrappers over the household and record services. Record
//! requests use the member session opened with
//! [`VaultContext::open_member_session`], if any.

use std::collections::BTreeMap;

use serde_json::Value;

use super::context::{Origin, VaultContext};
use crate::error::HearthResult;
use crate::models::{EntityRecord, EntityType, HouseholdUser, KeySource, RecordId, UserId};
use crate::services::{HouseholdService, RecordService};

impl VaultContext {
    pub fn add_member(&mut self, origin: &Origin, name: &str) -> HearthResult<HouseholdUser> {
        self.authorize(origin)?;
        HouseholdService::new(self.storage()?, self.settings()).create_member(name, None)
    }

    pub fn list_members(&mut self, origin: &Origin) -> HearthResult<Vec<HouseholdUser>> {
        self.authorize(origin)?;
        HouseholdService::new(self.storage()?, self.settings()).list_members()
    }

    /// Resolve a member by name or id
    pub fn find_member(
        &mut self,
        origin: &Origin,
        identifier: &str,
    ) -> HearthResult<Option<HouseholdUser>> {
        self.authorize(origin)?;
        HouseholdService::new(self.storage()?, self.settings()).find_member(identifier)
    }

    pub fn set_member_password(
        &mut self,
        origin: &Origin,
        user_id: UserId,
        current: Option<&str>,
        new: &str,
    ) -> HearthResult<()> {
        self.authorize(origin)?;
        HouseholdService::new(self.storage()?, self.settings())
            .set_member_password(user_id, current, new)
    }

    pub fn enable_record_encryption(
        &mut self,
        origin: &Origin,
        user_id: UserId,
        source: KeySource,
        secret: &str,
    ) -> HearthResult<()> {
        self.authorize(origin)?;
        HouseholdService::new(self.storage()?, self.settings()).enable_record_encryption(
            user_id,
            source,
            secret,
            &self.vault,
        )
    }

    /// Re-wrap a vault-keyed keyring under the member's own password
    pub fn move_to_member_password(
        &mut self,
        origin: &Origin,
        user_id: UserId,
        vault_password: &str,
        member_password: &str,
    ) -> HearthResult<()> {
        self.authorize(origin)?;
        self.sessions.remove(&user_id);
        HouseholdService::new(self.storage()?, self.settings()).move_to_member_password(
            user_id,
            vault_password,
            member_password,
            &self.vault,
        )
    }

    pub fn create_record(
        &mut self,
        origin: &Origin,
        owner_id: UserId,
        entity_type: EntityType,
        fields: BTreeMap<String, Value>,
    ) -> HearthResult<EntityRecord> {
        self.authorize(origin)?;
        RecordService::new(self.storage()?).create(
            owner_id,
            self.session(owner_id),
            entity_type,
            fields,
        )
    }

    pub fn get_record(
        &mut self,
        origin: &Origin,
        viewer_id: UserId,
        id: RecordId,
    ) -> HearthResult<EntityRecord> {
        self.authorize(origin)?;
        RecordService::new(self.storage()?).get(viewer_id, self.session(viewer_id), id)
    }

    pub fn list_records(
        &mut self,
        origin: &Origin,
        viewer_id: UserId,
        entity_type: Option<EntityType>,
    ) -> HearthResult<Vec<EntityRecord>> {
        self.authorize(origin)?;
        RecordService::new(self.storage()?).list_visible(
            viewer_id,
            self.session(viewer_id),
            entity_type,
        )
    }

    /// Household total of `field` across `owner_ids`
    pub fn combine_total(
        &mut self,
        origin: &Origin,
        viewer_id: UserId,
        owner_ids: &[UserId],
        entity_type: EntityType,
        field: &str,
    ) -> HearthResult<i64> {
        self.authorize(origin)?;
        RecordService::new(self.storage()?).combine_total(
            viewer_id,
            self.session(viewer_id),
            owner_ids,
            entity_type,
            field,
        )
    }
}
