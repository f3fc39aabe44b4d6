//! AES-256-GCM encryption/decryption
//!
//! Provides authenticated encryption with associated data. Each encryption
//! operation draws a fresh 96-bit nonce from the OS RNG.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{AeadInPlace, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use super::secure_memory::SecretKey;
use crate::error::{HearthError, HearthResult};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_LEN: usize = 12;

/// Size of the AES-GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Raw output of one encryption: nonce, ciphertext, and detached tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

fn cipher_for(key: &SecretKey) -> HearthResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| HearthError::Encryption(format!("Failed to create cipher: {}", e)))
}

/// Encrypt `plaintext`, binding `aad` into the tag
pub fn encrypt(key: &SecretKey, plaintext: &[u8], aad: &[u8]) -> HearthResult<Sealed> {
    let cipher = cipher_for(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, &mut buffer)
        .map_err(|e| HearthError::Encryption(format!("Encryption failed: {}", e)))?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(Sealed {
        nonce,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Decrypt and authenticate
///
/// Returns [`HearthError::Encryption`] when the tag does not verify; no part
/// of the plaintext is ever returned in that case.
pub fn decrypt(
    key: &SecretKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
    aad: &[u8],
) -> HearthResult<Vec<u8>> {
    let cipher = cipher_for(key)?;

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            aad,
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| {
            HearthError::Encryption("Decryption failed: invalid key or corrupted data".into())
        })?;

    Ok(buffer)
}

/// Encrypted field value as stored in JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// The nonce used for this encryption (base64 encoded)
    pub nonce: String,
    /// The ciphertext followed by the authentication tag (base64 encoded)
    pub ciphertext: String,
    /// Version for future algorithm upgrades
    #[serde(default = "default_version")]
    pub version: u8,
}

fn default_version() -> u8 {
    1
}

impl EncryptedData {
    fn from_sealed(sealed: &Sealed) -> Self {
        let mut combined = sealed.ciphertext.clone();
        combined.extend_from_slice(&sealed.tag);
        Self {
            nonce: STANDARD.encode(sealed.nonce),
            ciphertext: STANDARD.encode(combined),
            version: 1,
        }
    }

    fn to_sealed(&self) -> HearthResult<Sealed> {
        if self.version != 1 {
            return Err(HearthError::Encryption(format!(
                "Unsupported encryption version: {}",
                self.version
            )));
        }

        let nonce_bytes = STANDARD
            .decode(&self.nonce)
            .map_err(|e| HearthError::Encryption(format!("Invalid nonce encoding: {}", e)))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(HearthError::Encryption(format!(
                "Invalid nonce size: expected {}, got {}",
                NONCE_LEN,
                nonce_bytes.len()
            )));
        }

        let mut combined = STANDARD
            .decode(&self.ciphertext)
            .map_err(|e| HearthError::Encryption(format!("Invalid ciphertext encoding: {}", e)))?;
        if combined.len() < TAG_LEN {
            return Err(HearthError::Encryption("Ciphertext is truncated".into()));
        }
        let tag_start = combined.len() - TAG_LEN;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&combined[tag_start..]);
        combined.truncate(tag_start);

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&nonce_bytes);

        Ok(Sealed {
            nonce,
            ciphertext: combined,
            tag,
        })
    }
}

/// Encrypt a small value (field, wrapped key) into its JSON form
pub fn encrypt_value(key: &SecretKey, plaintext: &[u8], aad: &[u8]) -> HearthResult<EncryptedData> {
    let sealed = encrypt(key, plaintext, aad)?;
    Ok(EncryptedData::from_sealed(&sealed))
}

/// Decrypt a value produced by [`encrypt_value`] with the same `aad`
pub fn decrypt_value(key: &SecretKey, encrypted: &EncryptedData, aad: &[u8]) -> HearthResult<Vec<u8>> {
    let sealed = encrypted.to_sealed()?;
    decrypt(key, &sealed.nonce, &sealed.ciphertext, &sealed.tag, aad)
}
