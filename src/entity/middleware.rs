//! Field-level encryption in front of the record store
//!
//! Every record read and write passes through here. Writes move an
//! encrypting owner's sensitive fields into `encrypted_fields`; reads check
//! the viewer's share and decrypt in place.

use serde_json::Value;
use tracing::warn;

use super::authorizer::SharingAuthorizer;
use super::key_store::EntityKeyStore;
use super::session::UserSession;
use crate::crypto::{decrypt_value, encrypt_value};
use crate::error::{HearthError, HearthResult};
use crate::models::{Capability, EntityRecord, UserId};
use crate::storage::Storage;

pub struct EncryptionMiddleware<'a> {
    storage: &'a Storage,
}

impl<'a> EncryptionMiddleware<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Prepare a record for persistence
    ///
    /// Owners with record encryption enabled must present their own session.
    pub fn on_write(
        &self,
        mut record: EntityRecord,
        owner_session: Option<&UserSession>,
    ) -> HearthResult<EntityRecord> {
        let owner_id = record.owner_id();
        let owner = self.storage.users.require(owner_id)?;

        if !owner.encrypts_records() {
            if !record.encrypted_fields.is_empty() {
                return Err(HearthError::Validation(
                    "record carries ciphertext but its owner does not encrypt records".into(),
                ));
            }
            record.is_encrypted = false;
            return Ok(record);
        }

        let session = match owner_session {
            Some(session) if session.user_id() == owner_id => session,
            Some(_) => {
                return Err(HearthError::NotAuthorized(
                    "only the owner can write this record".into(),
                ))
            }
            None => {
                return Err(HearthError::NotAuthorized(format!(
                    "{} must unlock their records before writing",
                    owner.name
                )))
            }
        };

        let dek = EntityKeyStore::new(self.storage).get_owner_dek(
            owner_id,
            record.entity_type,
            session,
        )?;

        for field in record.entity_type.sensitive_fields() {
            if let Some(value) = record.fields.remove(*field) {
                let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(&value)?);
                let encrypted = encrypt_value(&dek, &plaintext, &record.field_aad(field))?;
                record.encrypted_fields.insert((*field).to_string(), encrypted);
            }
        }
        record.is_encrypted = true;
        Ok(record)
    }

    /// Authorize and decrypt a stored record for `viewer_id`
    ///
    /// Non-owners need a share granting `capability` whether or not the record
    /// is encrypted. Any failure is `NotAuthorized`; no ciphertext or blank
    /// value is ever returned in place of a field.
    pub fn on_read(
        &self,
        mut record: EntityRecord,
        viewer_id: UserId,
        viewer_session: Option<&UserSession>,
        capability: Capability,
    ) -> HearthResult<EntityRecord> {
        let owner_id = record.owner_id();
        SharingAuthorizer::new(self.storage).require(
            owner_id,
            record.entity_type,
            Some(record.id),
            viewer_id,
            capability,
        )?;

        if !record.is_encrypted || record.encrypted_fields.is_empty() {
            return Ok(record);
        }

        let session = viewer_session.ok_or_else(|| {
            HearthError::NotAuthorized("records are encrypted; unlock your records first".into())
        })?;
        let dek = EntityKeyStore::new(self.storage).unwrap_for_viewer(
            owner_id,
            record.entity_type,
            viewer_id,
            session,
        )?;

        let encrypted_fields = std::mem::take(&mut record.encrypted_fields);
        for (field, encrypted) in encrypted_fields {
            let plaintext = decrypt_value(&dek, &encrypted, &record.field_aad(&field))
                .map(zeroize::Zeroizing::new)
                .map_err(|_| {
                    warn!(record = %record.id, %field, "Field failed to decrypt");
                    HearthError::NotAuthorized(format!("field {} could not be decrypted", field))
                })?;
            let value: Value = serde_json::from_slice(&plaintext).map_err(|_| {
                HearthError::NotAuthorized(format!("field {} could not be decoded", field))
            })?;
            record.fields.insert(field, value);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DataShare, EntityType, HouseholdUser, KeySource, SharePermissions, ShareScope,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    const ITERATIONS: u32 = 1_000;

    fn add_member(storage: &Storage, name: &str, secret: Option<&str>) -> UserId {
        let user = HouseholdUser::new(name);
        let id = user.id;
        storage.users.upsert(user).unwrap();
        if let Some(secret) = secret {
            EntityKeyStore::new(storage)
                .provision_member(id, secret, KeySource::Member, ITERATIONS)
                .unwrap();
        }
        id
    }

    fn account(owner: UserId) -> EntityRecord {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), json!("Savings"));
        fields.insert("balance".to_string(), json!(250_000));
        fields.insert("kind".to_string(), json!("savings"));
        EntityRecord::new(owner, EntityType::Account, fields)
    }

    #[test]
    fn test_plaintext_owner_writes_plaintext() {
        let storage = Storage::new("unused.json");
        let alex = add_member(&storage, "Alex", None);

        let stored = EncryptionMiddleware::new(&storage)
            .on_write(account(alex), None)
            .unwrap();
        assert!(!stored.is_encrypted);
        assert_eq!(stored.amount("balance"), Some(250_000));
    }

    #[test]
    fn test_encrypting_owner_round_trip() {
        let storage = Storage::new("unused.json");
        let alex = add_member(&storage, "Alex", Some("alex-secret"));
        let session = EntityKeyStore::new(&storage)
            .open_session(alex, "alex-secret")
            .unwrap();
        let middleware = EncryptionMiddleware::new(&storage);

        let stored = middleware.on_write(account(alex), Some(&session)).unwrap();
        assert!(stored.is_encrypted);
        assert!(stored.field("balance").is_none());
        assert!(stored.encrypted_fields.contains_key("balance"));
        // Non-sensitive fields stay plaintext
        assert_eq!(stored.field("kind"), Some(&json!("savings")));

        let read = middleware
            .on_read(stored, alex, Some(&session), Capability::View)
            .unwrap();
        assert_eq!(read.amount("balance"), Some(250_000));
        assert_eq!(read.field("name"), Some(&json!("Savings")));
        assert!(read.encrypted_fields.is_empty());
    }

    #[test]
    fn test_encrypting_owner_needs_session() {
        let storage = Storage::new("unused.json");
        let alex = add_member(&storage, "Alex", Some("alex-secret"));

        let err = EncryptionMiddleware::new(&storage)
            .on_write(account(alex), None)
            .unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_owner_without_session_cannot_read_own_encrypted_record() {
        let storage = Storage::new("unused.json");
        let alex = add_member(&storage, "Alex", Some("alex-secret"));
        let session = EntityKeyStore::new(&storage)
            .open_session(alex, "alex-secret")
            .unwrap();
        let middleware = EncryptionMiddleware::new(&storage);
        let stored = middleware.on_write(account(alex), Some(&session)).unwrap();

        assert!(middleware
            .on_read(stored, alex, None, Capability::View)
            .unwrap_err()
            .is_access_denied());
    }

    #[test]
    fn test_no_share_cannot_decrypt_even_with_own_session() {
        let storage = Storage::new("unused.json");
        let alex = add_member(&storage, "Alex", Some("alex-secret"));
        let jordan = add_member(&storage, "Jordan", Some("jordan-secret"));
        let keys = EntityKeyStore::new(&storage);
        let alex_session = keys.open_session(alex, "alex-secret").unwrap();
        let jordan_session = keys.open_session(jordan, "jordan-secret").unwrap();
        let middleware = EncryptionMiddleware::new(&storage);

        let stored = middleware.on_write(account(alex), Some(&alex_session)).unwrap();
        let err = middleware
            .on_read(stored, jordan, Some(&jordan_session), Capability::View)
            .unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_plaintext_record_still_needs_share() {
        let storage = Storage::new("unused.json");
        let alex = add_member(&storage, "Alex", None);
        let jordan = add_member(&storage, "Jordan", None);
        let middleware = EncryptionMiddleware::new(&storage);

        let stored = middleware.on_write(account(alex), None).unwrap();
        assert!(middleware
            .on_read(stored.clone(), jordan, None, Capability::View)
            .unwrap_err()
            .is_access_denied());

        storage
            .shares
            .upsert_share(DataShare::new(
                alex,
                jordan,
                ShareScope::All,
                SharePermissions::VIEW_ONLY,
            ))
            .unwrap();
        assert!(middleware
            .on_read(stored, jordan, None, Capability::View)
            .is_ok());
    }

    #[test]
    fn test_swapped_ciphertext_is_rejected() {
        let storage = Storage::new("unused.json");
        let alex = add_member(&storage, "Alex", Some("alex-secret"));
        let session = EntityKeyStore::new(&storage)
            .open_session(alex, "alex-secret")
            .unwrap();
        let middleware = EncryptionMiddleware::new(&storage);

        let mut stored = middleware.on_write(account(alex), Some(&session)).unwrap();
        let name = stored.encrypted_fields.get("name").cloned().unwrap();
        stored.encrypted_fields.insert("balance".to_string(), name);

        assert!(middleware
            .on_read(stored, alex, Some(&session), Capability::View)
            .unwrap_err()
            .is_access_denied());
    }
}
