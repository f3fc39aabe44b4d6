//! Cryptographic functions for Hearth
//!
//! PBKDF2-HMAC-SHA256 key derivation, AES-256-GCM authenticated encryption,
//! X25519 sealed key envelopes for sharing, and Argon2id member passwords.

pub mod aead;
pub mod kdf;
pub mod keypair;
pub mod password;
pub mod secure_memory;

pub use aead::{decrypt, decrypt_value, encrypt, encrypt_value, EncryptedData, Sealed};
pub use kdf::{derive, generate_salt, KeyPurpose, DEFAULT_ITERATIONS, SALT_LEN};
pub use keypair::{open_key, seal_key, MemberKeyPair, SealedKey};
pub use password::{hash_member_password, verify_member_password, MemberHashParams};
pub use secure_memory::{constant_time_eq, SecretKey, SecureString, KEY_LEN};
