//! On-disk envelope for the encrypted store
//!
//! Layout: `salt(32) | nonce(12) | tag(16) | ciphertext`.

use std::path::Path;

use zeroize::Zeroizing;

use super::config::VaultConfig;
use crate::crypto::aead::{NONCE_LEN, TAG_LEN};
use crate::crypto::{decrypt, encrypt, SecretKey, SALT_LEN};
use crate::error::{HearthError, HearthResult};
use crate::storage::file_io::write_bytes_atomic;

const HEADER_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

/// Associated data bound into every envelope tag
const ENVELOPE_AAD: &[u8] = b"hearth.vault.envelope.v1";

/// Whole-file ciphertext plus the salt its key was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultEnvelope {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl VaultEnvelope {
    /// Encrypt `plaintext` under `key`, recording `salt` in the header
    pub fn seal(key: &SecretKey, salt: [u8; SALT_LEN], plaintext: &[u8]) -> HearthResult<Self> {
        let sealed = encrypt(key, plaintext, ENVELOPE_AAD)?;
        Ok(Self {
            salt,
            nonce: sealed.nonce,
            tag: sealed.tag,
            ciphertext: sealed.ciphertext,
        })
    }

    /// Authenticate and decrypt; any failure is `CorruptVault`
    pub fn open(&self, key: &SecretKey) -> HearthResult<Zeroizing<Vec<u8>>> {
        decrypt(key, &self.nonce, &self.ciphertext, &self.tag, ENVELOPE_AAD)
            .map(Zeroizing::new)
            .map_err(|_| HearthError::CorruptVault("envelope failed authentication".into()))
    }

    /// Derive the key from `password` and this envelope's salt, then open
    ///
    /// The caller verifies the password first; a failure here means the
    /// envelope itself is bad.
    pub fn open_with_password(
        &self,
        config: &VaultConfig,
        password: &str,
    ) -> HearthResult<Zeroizing<Vec<u8>>> {
        let key = config.encryption_key(password, &self.salt)?;
        self.open(&key)
    }

    /// Read and parse an envelope file
    pub fn read(path: &Path) -> HearthResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HearthError::MissingFile(path.display().to_string())
            } else {
                HearthError::Io(format!("Failed to read {}: {}", path.display(), e))
            }
        })?;
        Self::from_bytes(&bytes)
    }

    /// Write the envelope atomically
    pub fn write(&self, path: &Path) -> HearthResult<()> {
        write_bytes_atomic(path, &self.to_bytes())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> HearthResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(HearthError::CorruptVault(format!(
                "envelope is {} bytes, shorter than its {}-byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let (salt_bytes, rest) = bytes.split_at(SALT_LEN);
        let (nonce_bytes, rest) = rest.split_at(NONCE_LEN);
        let (tag_bytes, ciphertext) = rest.split_at(TAG_LEN);

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(salt_bytes);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(tag_bytes);

        Ok(Self {
            salt,
            nonce,
            tag,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let key = SecretKey::generate();
        let envelope = VaultEnvelope::seal(&key, [7u8; SALT_LEN], b"household").unwrap();
        let bytes = envelope.to_bytes();

        assert_eq!(bytes.len(), HEADER_LEN + b"household".len());
        assert_eq!(&bytes[..SALT_LEN], &[7u8; SALT_LEN]);
        assert_eq!(&bytes[SALT_LEN..SALT_LEN + NONCE_LEN], &envelope.nonce);

        let parsed = VaultEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.open(&key).unwrap().as_slice(), b"household");
    }

    #[test]
    fn test_write_and_read_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("household.json.enc");
        let key = SecretKey::generate();

        VaultEnvelope::seal(&key, [1u8; SALT_LEN], b"data")
            .unwrap()
            .write(&path)
            .unwrap();

        let read = VaultEnvelope::read(&path).unwrap();
        assert_eq!(read.open(&key).unwrap().as_slice(), b"data");

        let missing = VaultEnvelope::read(&temp_dir.path().join("nope.enc")).unwrap_err();
        assert!(matches!(missing, HearthError::MissingFile(_)));
    }

    #[test]
    fn test_tampered_body_is_corrupt() {
        let key = SecretKey::generate();
        let mut bytes = VaultEnvelope::seal(&key, [0u8; SALT_LEN], b"{\"users\":[]}")
            .unwrap()
            .to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let err = VaultEnvelope::from_bytes(&bytes).unwrap().open(&key).unwrap_err();
        assert!(matches!(err, HearthError::CorruptVault(_)));
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        let err = VaultEnvelope::from_bytes(&[0u8; HEADER_LEN - 1]).unwrap_err();
        assert!(matches!(err, HearthError::CorruptVault(_)));
    }

    #[test]
    fn test_wrong_key_is_corrupt() {
        let envelope = VaultEnvelope::seal(&SecretKey::generate(), [0u8; SALT_LEN], b"x").unwrap();
        assert!(envelope.open(&SecretKey::generate()).is_err());
    }
}
