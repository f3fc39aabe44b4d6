//! Member-level password hashing using Argon2id
//!
//! Household members may protect their profile with a password that is
//! independent of the vault password. Only an Argon2id PHC string is stored.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};

use crate::error::{HearthError, HearthResult};

/// Argon2id cost parameters for member password hashes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberHashParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism degree (default: 4)
    pub parallelism: u32,
}

impl Default for MemberHashParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl MemberHashParams {
    /// Cheapest parameters Argon2 accepts
    pub fn minimal() -> Self {
        Self {
            memory_cost: Params::MIN_M_COST,
            time_cost: Params::MIN_T_COST,
            parallelism: 1,
        }
    }
}

/// Hash a member password into a PHC string
pub fn hash_member_password(password: &str, params: &MemberHashParams) -> HearthResult<String> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        None,
    )
    .map_err(|e| HearthError::Encryption(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);
    let salt = SaltString::generate(&mut OsRng);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HearthError::Encryption(format!("Password hashing failed: {}", e)))
}

/// Verify a member password against its stored PHC string
///
/// The costs encoded in the PHC string are used, so changing
/// [`MemberHashParams`] never invalidates existing hashes.
pub fn verify_member_password(password: &str, phc: &str) -> HearthResult<bool> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| HearthError::Encryption(format!("Invalid stored password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let phc = hash_member_password("kid-pin-2024", &MemberHashParams::minimal()).unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(verify_member_password("kid-pin-2024", &phc).unwrap());
        assert!(!verify_member_password("kid-pin-2025", &phc).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let params = MemberHashParams::minimal();
        let a = hash_member_password("same", &params).unwrap();
        let b = hash_member_password("same", &params).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_error() {
        assert!(verify_member_password("pw", "not-a-phc-string").is_err());
    }
}
