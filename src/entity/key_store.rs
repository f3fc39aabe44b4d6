//! Member keyrings and per-owner data-encryption keys
//!
//! Each member with record encryption enabled holds an X25519 keypair whose
//! secret half is wrapped under a KEK derived from the member's unlock secret.
//! Each (owner, entity type) bucket has one random DEK, sealed separately to
//! the owner and to every recipient granted access.

use base64::{engine::general_purpose::STANDARD, Engine};
use crypto_box::PublicKey;
use tracing::{debug, info};

use super::session::UserSession;
use crate::crypto::keypair::decode_public;
use crate::crypto::{
    decrypt_value, derive, encrypt_value, generate_salt, open_key, seal_key, KeyPurpose,
    MemberKeyPair, SecretKey, SALT_LEN,
};
use crate::error::{HearthError, HearthResult};
use crate::models::{EntityType, KeySource, MemberKeyring, UserId};
use crate::storage::{Storage, WrappedDek};

fn keyring_aad(user_id: UserId) -> Vec<u8> {
    format!("hearth.member:{}", user_id.as_uuid()).into_bytes()
}

fn derive_kek(secret: &str, salt_b64: &str, iterations: u32) -> HearthResult<SecretKey> {
    let salt: [u8; SALT_LEN] = STANDARD
        .decode(salt_b64)
        .map_err(|e| HearthError::Encryption(format!("Invalid key salt encoding: {}", e)))?
        .try_into()
        .map_err(|_| HearthError::Encryption("Key salt has the wrong length".into()))?;
    derive(secret, &salt, iterations, KeyPurpose::MemberKek)
}

fn wrap_keypair(
    user_id: UserId,
    keypair: &MemberKeyPair,
    secret: &str,
    source: KeySource,
    iterations: u32,
) -> HearthResult<MemberKeyring> {
    let key_salt = STANDARD.encode(generate_salt());
    let kek = derive_kek(secret, &key_salt, iterations)?;
    let wrapped_secret = encrypt_value(&kek, keypair.secret_bytes().as_slice(), &keyring_aad(user_id))?;

    Ok(MemberKeyring {
        public_key: keypair.public_b64(),
        key_salt,
        iterations,
        key_source: source,
        wrapped_secret,
    })
}

/// Keyring and DEK operations over the household store
pub struct EntityKeyStore<'a> {
    storage: &'a Storage,
}

impl<'a> EntityKeyStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Give a member a fresh keypair wrapped under `secret`
    pub fn provision_member(
        &self,
        user_id: UserId,
        secret: &str,
        source: KeySource,
        iterations: u32,
    ) -> HearthResult<MemberKeyring> {
        let mut user = self.storage.users.require(user_id)?;
        if user.keyring.is_some() {
            return Err(HearthError::Duplicate {
                entity_type: "Member keyring",
                identifier: user_id.to_string(),
            });
        }

        let keypair = MemberKeyPair::generate();
        let keyring = wrap_keypair(user_id, &keypair, secret, source, iterations)?;

        user.keyring = Some(keyring.clone());
        user.updated_at = chrono::Utc::now();
        self.storage.users.upsert(user)?;
        info!(user = %user_id, ?source, "Provisioned member keyring");
        Ok(keyring)
    }

    /// Unwrap a member's secret key
    ///
    /// A wrong secret is `WrongPassword`.
    pub fn open_session(&self, user_id: UserId, secret: &str) -> HearthResult<UserSession> {
        let user = self.storage.users.require(user_id)?;
        let keyring = user.keyring.as_ref().ok_or_else(|| {
            HearthError::Validation(format!("{} does not have record encryption enabled", user.name))
        })?;

        let kek = derive_kek(secret, &keyring.key_salt, keyring.iterations)?;
        let secret_bytes = zeroize::Zeroizing::new(
            decrypt_value(&kek, &keyring.wrapped_secret, &keyring_aad(user_id))
                .map_err(|_| HearthError::WrongPassword)?,
        );
        let bytes: [u8; 32] = secret_bytes
            .as_slice()
            .try_into()
            .map_err(|_| HearthError::Encryption("Wrapped member key has the wrong length".into()))?;

        let keypair = MemberKeyPair::from_secret_bytes(bytes);
        if keypair.public_b64() != keyring.public_key {
            return Err(HearthError::Encryption(
                "Member keyring does not match its public key".into(),
            ));
        }

        debug!(user = %user_id, "Opened member session");
        Ok(UserSession::new(user_id, keypair))
    }

    /// Re-wrap a member's secret key under a new unlock secret
    ///
    /// The keypair is unchanged, so every DEK sealed to the member stays
    /// readable.
    pub fn rewrap_member(
        &self,
        user_id: UserId,
        old_secret: &str,
        new_secret: &str,
        source: KeySource,
    ) -> HearthResult<MemberKeyring> {
        let session = self.open_session(user_id, old_secret)?;
        let mut user = self.storage.users.require(user_id)?;
        let iterations = user
            .keyring
            .as_ref()
            .map(|k| k.iterations)
            .ok_or_else(|| HearthError::Validation("Member has no keyring".into()))?;

        let keyring = wrap_keypair(user_id, session.keypair(), new_secret, source, iterations)?;
        user.keyring = Some(keyring.clone());
        user.updated_at = chrono::Utc::now();
        self.storage.users.upsert(user)?;
        info!(user = %user_id, ?source, "Re-wrapped member keyring");
        Ok(keyring)
    }

    /// Public key of a member with record encryption enabled
    pub fn public_key_of(&self, user_id: UserId) -> HearthResult<Option<PublicKey>> {
        let user = self.storage.users.require(user_id)?;
        user.keyring
            .as_ref()
            .map(|k| decode_public(&k.public_key))
            .transpose()
    }

    /// The owner's DEK for a type, created on first use
    ///
    /// A new DEK is sealed to the owner and to every recipient whose existing
    /// share already covers the type.
    pub fn get_owner_dek(
        &self,
        owner_id: UserId,
        entity_type: EntityType,
        owner_session: &UserSession,
    ) -> HearthResult<SecretKey> {
        if owner_session.user_id() != owner_id {
            return Err(HearthError::NotAuthorized(
                "only the owner can use the owner's key".into(),
            ));
        }

        if let Some(wrapped) = self.storage.keys.get(owner_id, entity_type, owner_id)? {
            return open_key(&wrapped.sealed, owner_session.secret());
        }

        let dek = SecretKey::generate();
        let sealed = seal_key(&dek, owner_session.public_key())?;
        self.storage
            .keys
            .upsert(WrappedDek::new(owner_id, entity_type, owner_id, sealed))?;

        let mut recipients: Vec<UserId> = self
            .storage
            .shares
            .shares_by_owner(owner_id)?
            .into_iter()
            .filter(|s| s.scope.covers(entity_type))
            .map(|s| s.recipient_id)
            .collect();
        recipients.sort();
        recipients.dedup();

        for recipient_id in recipients {
            if let Some(public) = self.public_key_of(recipient_id)? {
                self.wrap_for_recipient(&dek, owner_id, entity_type, recipient_id, &public)?;
            }
        }

        info!(owner = %owner_id, %entity_type, "Created data key");
        Ok(dek)
    }

    /// Seal a copy of `dek` to a recipient
    pub fn wrap_for_recipient(
        &self,
        dek: &SecretKey,
        owner_id: UserId,
        entity_type: EntityType,
        recipient_id: UserId,
        recipient_public: &PublicKey,
    ) -> HearthResult<()> {
        let sealed = seal_key(dek, recipient_public)?;
        self.storage
            .keys
            .upsert(WrappedDek::new(owner_id, entity_type, recipient_id, sealed))?;
        debug!(owner = %owner_id, %entity_type, recipient = %recipient_id, "Wrapped data key");
        Ok(())
    }

    /// Open the viewer's copy of an owner's DEK
    pub fn unwrap_for_viewer(
        &self,
        owner_id: UserId,
        entity_type: EntityType,
        viewer_id: UserId,
        viewer_session: &UserSession,
    ) -> HearthResult<SecretKey> {
        if viewer_session.user_id() != viewer_id {
            return Err(HearthError::NotAuthorized("session belongs to another member".into()));
        }

        let wrapped = self
            .storage
            .keys
            .get(owner_id, entity_type, viewer_id)?
            .ok_or_else(|| {
                HearthError::NotAuthorized(format!("no {} key shared with this member", entity_type))
            })?;

        open_key(&wrapped.sealed, viewer_session.secret())
            .map_err(|_| HearthError::NotAuthorized("shared key could not be opened".into()))
    }

    /// Delete a recipient's copy
    pub fn revoke(
        &self,
        owner_id: UserId,
        entity_type: EntityType,
        recipient_id: UserId,
    ) -> HearthResult<bool> {
        if owner_id == recipient_id {
            return Err(HearthError::Validation("cannot revoke the owner's own key".into()));
        }
        let removed = self.storage.keys.delete(owner_id, entity_type, recipient_id)?;
        if removed {
            info!(owner = %owner_id, %entity_type, recipient = %recipient_id, "Revoked data key");
        }
        Ok(removed)
    }
}
