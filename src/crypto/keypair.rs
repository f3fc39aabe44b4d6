//! Member keypairs and sealed key envelopes
//!
//! Each household member owns an X25519 keypair. Data-encryption keys are
//! sealed to a member's public key with an ephemeral X25519 exchange and
//! XSalsa20-Poly1305, so an owner can share a DEK with a member whose session
//! is not open.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD, Engine};
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey as BoxSecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::secure_memory::SecretKey;
use crate::error::{HearthError, HearthResult};

/// Size of the XSalsa20 nonce in bytes
const BOX_NONCE_LEN: usize = 24;

/// A member's X25519 keypair
///
/// The secret half zeroizes on drop (provided by crypto_box).
pub struct MemberKeyPair {
    pub secret: BoxSecretKey,
    pub public: PublicKey,
}

impl MemberKeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let secret = BoxSecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Rebuild a keypair from raw secret key bytes
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = BoxSecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Raw secret key bytes, wiped when the returned buffer drops
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// Public key as base64 for storage
    pub fn public_b64(&self) -> String {
        encode_public(&self.public)
    }
}

/// Encode a public key as base64
pub fn encode_public(public: &PublicKey) -> String {
    STANDARD.encode(public.as_bytes())
}

/// Decode a stored base64 public key
pub fn decode_public(encoded: &str) -> HearthResult<PublicKey> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| HearthError::Encryption(format!("Invalid public key encoding: {}", e)))?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| HearthError::Encryption("Public key must be 32 bytes".into()))?;
    Ok(PublicKey::from(array))
}

/// A symmetric key sealed to one member's public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    /// Ephemeral X25519 public key (base64)
    pub ephemeral_public_key: String,
    /// XSalsa20 nonce (base64)
    pub nonce: String,
    /// Sealed key plus Poly1305 tag (base64)
    pub ciphertext: String,
}

/// Seal `key` so only the holder of `recipient`'s secret key can open it
pub fn seal_key(key: &SecretKey, recipient: &PublicKey) -> HearthResult<SealedKey> {
    let ephemeral = BoxSecretKey::generate(&mut OsRng);
    let ephemeral_public = ephemeral.public_key();
    let salsa_box = SalsaBox::new(recipient, &ephemeral);

    let mut nonce = [0u8; BOX_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = salsa_box
        .encrypt(crypto_box::Nonce::from_slice(&nonce), key.as_bytes().as_slice())
        .map_err(|e| HearthError::Encryption(format!("Key seal failed: {}", e)))?;

    Ok(SealedKey {
        ephemeral_public_key: STANDARD.encode(ephemeral_public.as_bytes()),
        nonce: STANDARD.encode(nonce),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Open a sealed key with the recipient's secret key
pub fn open_key(sealed: &SealedKey, recipient: &BoxSecretKey) -> HearthResult<SecretKey> {
    let ephemeral_public = decode_public(&sealed.ephemeral_public_key)?;
    let nonce = STANDARD
        .decode(&sealed.nonce)
        .map_err(|e| HearthError::Encryption(format!("Invalid nonce encoding: {}", e)))?;
    if nonce.len() != BOX_NONCE_LEN {
        return Err(HearthError::Encryption("Invalid sealed key nonce".into()));
    }
    let ciphertext = STANDARD
        .decode(&sealed.ciphertext)
        .map_err(|e| HearthError::Encryption(format!("Invalid ciphertext encoding: {}", e)))?;

    let salsa_box = SalsaBox::new(&ephemeral_public, recipient);
    let plaintext = Zeroizing::new(
        salsa_box
            .decrypt(crypto_box::Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| {
                HearthError::Encryption("Key open failed (wrong key or tampered data)".into())
            })?,
    );

    SecretKey::from_slice(&plaintext)
        .ok_or_else(|| HearthError::Encryption("Sealed key has the wrong length".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open() {
        let member = MemberKeyPair::generate();
        let dek = SecretKey::generate();

        let sealed = seal_key(&dek, &member.public).unwrap();
        let opened = open_key(&sealed, &member.secret).unwrap();

        assert_eq!(opened.as_bytes(), dek.as_bytes());
    }

    #[test]
    fn test_other_member_cannot_open() {
        let alice = MemberKeyPair::generate();
        let bob = MemberKeyPair::generate();
        let sealed = seal_key(&SecretKey::generate(), &alice.public).unwrap();

        assert!(open_key(&sealed, &bob.secret).is_err());
    }

    #[test]
    fn test_keypair_rebuilds_from_secret() {
        let original = MemberKeyPair::generate();
        let rebuilt = MemberKeyPair::from_secret_bytes(*original.secret_bytes());
        assert_eq!(rebuilt.public_b64(), original.public_b64());
    }

    #[test]
    fn test_public_key_round_trip_through_base64() {
        let member = MemberKeyPair::generate();
        let decoded = decode_public(&member.public_b64()).unwrap();
        assert_eq!(decoded.as_bytes(), member.public.as_bytes());
        assert!(decode_public("AAAA").is_err());
    }
}
