//! Entity record model
//!
//! A generic persisted domain object. Sensitive fields move from `fields` to
//! `encrypted_fields` when the owner encrypts records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity_type::EntityType;
use super::ids::{RecordId, UserId};
use crate::crypto::EncryptedData;

/// A persisted record owned by one household member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Unique identifier
    pub id: RecordId,

    /// Owning member; fixed at creation
    owner_id: UserId,

    /// Kind of record
    pub entity_type: EntityType,

    /// Whether `encrypted_fields` holds ciphertext
    #[serde(default)]
    pub is_encrypted: bool,

    /// Plaintext field values
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,

    /// Ciphertext of sensitive fields, keyed by field name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub encrypted_fields: BTreeMap<String, EncryptedData>,

    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// When the record was last modified
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    /// Create a plaintext record
    pub fn new(owner_id: UserId, entity_type: EntityType, fields: BTreeMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            owner_id,
            entity_type,
            is_encrypted: false,
            fields,
            encrypted_fields: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The owning member
    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Get a plaintext field value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a plaintext field as integer cents
    pub fn amount(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }

    /// Associated data binding a field ciphertext to this record
    pub fn field_aad(&self, field: &str) -> Vec<u8> {
        format!("{}:{}:{}", self.entity_type, self.id.as_uuid(), field).into_bytes()
    }

    /// Mark the record as modified
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> EntityRecord {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), json!("Joint Checking"));
        fields.insert("balance".to_string(), json!(125_000));
        EntityRecord::new(UserId::new(), EntityType::Account, fields)
    }

    #[test]
    fn test_new_record_is_plaintext() {
        let record = sample();
        assert!(!record.is_encrypted);
        assert_eq!(record.amount("balance"), Some(125_000));
        assert!(record.encrypted_fields.is_empty());
    }

    #[test]
    fn test_field_aad_is_record_specific() {
        let a = sample();
        let b = sample();
        assert_ne!(a.field_aad("balance"), b.field_aad("balance"));
        assert_ne!(a.field_aad("balance"), a.field_aad("name"));
    }

    #[test]
    fn test_owner_survives_serialization() {
        let record = sample();
        let json = serde_json::to_string(&record).unwrap();
        let back: EntityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.owner_id(), record.owner_id());
    }
}
