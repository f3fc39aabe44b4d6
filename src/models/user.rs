//! Household member model
//!
//! A household member is a local profile sharing the installation. Members
//! that encrypt their records also carry a keyring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UserId;
use crate::crypto::EncryptedData;

/// Which secret unlocks a member's keyring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// The vault master password; anyone holding it can open the keyring
    Vault,
    /// The member's own password
    Member,
}

/// A member's public key and password-wrapped secret key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberKeyring {
    /// X25519 public key (base64); DEKs are sealed to this
    pub public_key: String,

    /// Salt for the key-encryption key (base64)
    pub key_salt: String,

    /// PBKDF2 iterations used for the key-encryption key
    pub iterations: u32,

    /// Which secret the key-encryption key is derived from
    pub key_source: KeySource,

    /// X25519 secret key encrypted under the key-encryption key
    pub wrapped_secret: EncryptedData,
}

/// A household member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdUser {
    /// Unique identifier
    pub id: UserId,

    /// Display name
    pub name: String,

    /// Display color (UI only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Argon2id PHC hash of the member-level password, if one is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    /// Present once the member encrypts their records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyring: Option<MemberKeyring>,

    /// When the member was created
    pub created_at: DateTime<Utc>,

    /// When the member was last modified
    pub updated_at: DateTime<Utc>,
}

impl HouseholdUser {
    /// Create a new member without password or keyring
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            name: name.into(),
            color: None,
            password_hash: None,
            keyring: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether records this member writes are encrypted
    pub fn encrypts_records(&self) -> bool {
        self.keyring.is_some()
    }

    /// Whether a member-level password is set
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Validate the member
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Member name cannot be empty".into());
        }
        if self.name.len() > 64 {
            return Err("Member name cannot exceed 64 characters".into());
        }
        Ok(())
    }
}
