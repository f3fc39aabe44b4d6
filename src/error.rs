//! Custom error types for Hearth
//!
//! This module defines the error hierarchy for the vault and entity layers
//! using thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for Hearth operations
#[derive(Error, Debug)]
pub enum HearthError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for data models and command arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Password verification failed (vault or member password)
    #[error("Incorrect password")]
    WrongPassword,

    /// A sharing check failed
    #[error("Access denied: {0}")]
    NotAuthorized(String),

    /// The vault envelope failed authentication or is malformed
    #[error("Vault is corrupt: {0}")]
    CorruptVault(String),

    /// An expected plaintext or encrypted file is absent
    #[error("Missing file: {0}")]
    MissingFile(String),

    /// The vault is locked and the operation requires it unlocked
    #[error("Vault is locked")]
    Locked,

    /// The caller is not the trusted UI process
    #[error("Untrusted request origin: {0}")]
    UntrustedOrigin(String),

    /// A vault operation requires the vault to be enabled
    #[error("Vault is not enabled")]
    VaultNotEnabled,

    /// The vault was already enabled
    #[error("Vault is already enabled")]
    AlreadyEnabled,

    /// Low-level cryptographic failure (cipher setup, key sizes, encoding)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl HearthError {
    /// Create a "not found" error for household users
    pub fn user_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "User",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for entity records
    pub fn record_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Record",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for data shares
    pub fn share_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Share",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for sharing defaults
    pub fn default_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Sharing default",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error means the caller was denied access
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::NotAuthorized(_))
    }

    /// Message suitable for showing to the user.
    ///
    /// Password failures all collapse into one message so the UI cannot be
    /// used to tell a wrong password apart from an unknown member.
    pub fn user_message(&self) -> String {
        match self {
            Self::WrongPassword => "Incorrect password".to_string(),
            Self::NotFound {
                entity_type: "User",
                ..
            } => "Incorrect password".to_string(),
            Self::NotAuthorized(_) => "Access denied".to_string(),
            Self::CorruptVault(_) => {
                "The vault could not be opened: wrong password or corrupt vault".to_string()
            }
            other => other.to_string(),
        }
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for HearthError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HearthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for Hearth operations
pub type HearthResult<T> = Result<T, HearthError>;
