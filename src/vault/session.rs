//! Ephemeral session key held while the vault is unlocked

use std::time::Instant;

use crate::crypto::SecretKey;

/// The at-rest encryption key for the current unlock
///
/// Owned by the vault manager only. The key bytes are wiped when the session
/// is dropped, which happens on every lock.
pub struct SessionKey {
    key: SecretKey,
    established_at: Instant,
}

impl SessionKey {
    pub fn new(key: SecretKey) -> Self {
        Self {
            key,
            established_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &SecretKey {
        &self.key
    }

    /// When the session was opened
    pub fn established_at(&self) -> Instant {
        self.established_at
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
