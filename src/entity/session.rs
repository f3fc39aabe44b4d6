//! An open member session
//!
//! Holding a `UserSession` means the member's X25519 secret key has been
//! unwrapped. It is the only way to open DEKs sealed to that member.

use crypto_box::{PublicKey, SecretKey as BoxSecretKey};

use crate::crypto::MemberKeyPair;
use crate::models::UserId;

pub struct UserSession {
    user_id: UserId,
    keypair: MemberKeyPair,
}

impl UserSession {
    pub(crate) fn new(user_id: UserId, keypair: MemberKeyPair) -> Self {
        Self { user_id, keypair }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    pub(crate) fn secret(&self) -> &BoxSecretKey {
        &self.keypair.secret
    }

    pub(crate) fn keypair(&self) -> &MemberKeyPair {
        &self.keypair
    }
}

impl std::fmt::Debug for UserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSession")
            .field("user_id", &self.user_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
