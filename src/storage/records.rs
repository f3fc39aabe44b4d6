//! Entity record repository
//!
//! Stores records exactly as the middleware hands them over; this layer never
//! looks inside encrypted fields.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::HearthError;
use crate::models::{EntityRecord, EntityType, RecordId, UserId};

/// Repository for entity records
pub struct RecordRepository {
    data: RwLock<HashMap<RecordId, EntityRecord>>,
}

impl RecordRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the contents with records loaded from disk
    pub fn replace_all(&self, records: Vec<EntityRecord>) -> Result<(), HearthError> {
        let mut data = self.data.write().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.clear();
        for record in records {
            data.insert(record.id, record);
        }
        Ok(())
    }

    /// Get a record by ID
    pub fn get(&self, id: RecordId) -> Result<Option<EntityRecord>, HearthError> {
        let data = self.data.read().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(&id).cloned())
    }

    /// Get all records, oldest first
    pub fn get_all(&self) -> Result<Vec<EntityRecord>, HearthError> {
        let data = self.data.read().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut records: Vec<_> = data.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    /// Get all records of one type, oldest first
    pub fn get_by_type(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, HearthError> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| r.entity_type == entity_type)
            .collect())
    }

    /// Get all records owned by a user
    pub fn get_by_owner(&self, owner_id: UserId) -> Result<Vec<EntityRecord>, HearthError> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| r.owner_id() == owner_id)
            .collect())
    }

    /// Insert or update a record
    ///
    /// An update may not change the owner of an existing record.
    pub fn upsert(&self, record: EntityRecord) -> Result<(), HearthError> {
        let mut data = self.data.write().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if let Some(existing) = data.get(&record.id) {
            if existing.owner_id() != record.owner_id() {
                return Err(HearthError::Validation(
                    "Record ownership cannot change".into(),
                ));
            }
        }

        data.insert(record.id, record);
        Ok(())
    }

    /// Delete a record
    pub fn delete(&self, id: RecordId) -> Result<bool, HearthError> {
        let mut data = self.data.write().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(data.remove(&id).is_some())
    }

    /// Count records
    pub fn count(&self) -> Result<usize, HearthError> {
        let data = self.data.read().map_err(|e| {
            HearthError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.len())
    }
}

impl Default for RecordRepository {
    fn default() -> Self {
        Self::new()
    }
}
