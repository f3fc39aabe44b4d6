//! Password-based key derivation using PBKDF2-HMAC-SHA256
//!
//! One slow hash serves every password-derived value in Hearth. Each use
//! passes a [`KeyPurpose`] whose label is mixed into the salt, so the
//! verification hash and the encryption key stay unrelated even when derived
//! from the same password.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::secure_memory::{SecretKey, KEY_LEN};
use crate::error::{HearthError, HearthResult};

/// Iteration count written into new installations
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Length of every stored salt in bytes
pub const SALT_LEN: usize = 32;

/// What a derived value is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    /// Stored hash used only to verify the vault password
    PasswordHash,
    /// Whole-file vault encryption key
    VaultEncryption,
    /// Key-encryption key protecting a member's keyring
    MemberKek,
}

impl KeyPurpose {
    fn label(self) -> &'static [u8] {
        match self {
            Self::PasswordHash => b"hearth.vault.password-hash",
            Self::VaultEncryption => b"hearth.vault.encryption",
            Self::MemberKek => b"hearth.member.kek",
        }
    }
}

/// Generate a fresh random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 32-byte key from a password
///
/// `iterations` must come from the stored config, never from
/// [`DEFAULT_ITERATIONS`] at the call site.
pub fn derive(
    password: &str,
    salt: &[u8; SALT_LEN],
    iterations: u32,
    purpose: KeyPurpose,
) -> HearthResult<SecretKey> {
    if iterations == 0 {
        return Err(HearthError::Encryption(
            "Key derivation requires at least one iteration".into(),
        ));
    }

    let label = purpose.label();
    let mut labelled_salt = Vec::with_capacity(label.len() + 1 + SALT_LEN);
    labelled_salt.extend_from_slice(label);
    labelled_salt.push(0);
    labelled_salt.extend_from_slice(salt);

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &labelled_salt, iterations, &mut *output);

    Ok(SecretKey::from_bytes(*output))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITER: u32 = 1_000;

    #[test]
    fn test_same_inputs_same_key() {
        let salt = generate_salt();
        let a = derive("correct-horse", &salt, ITER, KeyPurpose::VaultEncryption).unwrap();
        let b = derive("correct-horse", &salt, ITER, KeyPurpose::VaultEncryption).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_different_salt_different_key() {
        let a = derive("pw", &generate_salt(), ITER, KeyPurpose::VaultEncryption).unwrap();
        let b = derive("pw", &generate_salt(), ITER, KeyPurpose::VaultEncryption).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_purpose_separates_outputs() {
        let salt = generate_salt();
        let hash = derive("pw", &salt, ITER, KeyPurpose::PasswordHash).unwrap();
        let key = derive("pw", &salt, ITER, KeyPurpose::VaultEncryption).unwrap();
        assert_ne!(hash.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_iterations_change_output() {
        let salt = generate_salt();
        let a = derive("pw", &salt, ITER, KeyPurpose::MemberKek).unwrap();
        let b = derive("pw", &salt, ITER + 1, KeyPurpose::MemberKek).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let salt = generate_salt();
        assert!(derive("pw", &salt, 0, KeyPurpose::PasswordHash).is_err());
    }
}
