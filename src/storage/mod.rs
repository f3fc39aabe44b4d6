//! Storage layer for Hearth
//!
//! A single JSON document (`household.json`) holds every member, record,
//! share, sharing default, and wrapped key. Keeping the whole household in one
//! file lets the vault encrypt it as a unit. Writes are atomic.

pub mod file_io;
pub mod keys;
pub mod records;
pub mod shares;
pub mod users;

pub use file_io::{read_json, write_json_atomic};
pub use keys::{KeyRepository, WrappedDek};
pub use records::RecordRepository;
pub use shares::ShareRepository;
pub use users::UserRepository;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HearthError;
use crate::models::{DataShare, EntityRecord, HouseholdUser, SharingDefault};

/// Current on-disk layout of the household document
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Serialized form of the household store
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub users: Vec<HouseholdUser>,
    #[serde(default)]
    pub records: Vec<EntityRecord>,
    #[serde(default)]
    pub shares: Vec<DataShare>,
    #[serde(default)]
    pub defaults: Vec<SharingDefault>,
    #[serde(default)]
    pub keys: Vec<WrappedDek>,
}

fn default_schema_version() -> u32 {
    STORE_SCHEMA_VERSION
}

/// Main storage coordinator that provides access to all repositories
pub struct Storage {
    path: PathBuf,
    pub users: UserRepository,
    pub records: RecordRepository,
    pub shares: ShareRepository,
    pub keys: KeyRepository,
}

impl Storage {
    /// Create an empty store backed by `path`; nothing is read yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            users: UserRepository::new(),
            records: RecordRepository::new(),
            shares: ShareRepository::new(),
            keys: KeyRepository::new(),
        }
    }

    /// Open the store at `path`, loading it if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HearthError> {
        let storage = Self::new(path);
        storage.load()?;
        Ok(storage)
    }

    /// Path of the plaintext document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the plaintext document exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load all data from disk, replacing what is in memory
    pub fn load(&self) -> Result<(), HearthError> {
        let doc: StoreDocument = read_json(&self.path)?;
        if doc.schema_version > STORE_SCHEMA_VERSION {
            return Err(HearthError::Storage(format!(
                "Store schema version {} is newer than supported version {}",
                doc.schema_version, STORE_SCHEMA_VERSION
            )));
        }

        debug!(
            users = doc.users.len(),
            records = doc.records.len(),
            shares = doc.shares.len(),
            "Loaded household store"
        );

        self.users.replace_all(doc.users)?;
        self.records.replace_all(doc.records)?;
        self.shares.replace_all(doc.shares, doc.defaults)?;
        self.keys.replace_all(doc.keys)?;
        Ok(())
    }

    /// Snapshot every repository into a document
    pub fn to_document(&self) -> Result<StoreDocument, HearthError> {
        Ok(StoreDocument {
            schema_version: STORE_SCHEMA_VERSION,
            users: self.users.get_all()?,
            records: self.records.get_all()?,
            shares: self.shares.all_shares()?,
            defaults: self.shares.all_defaults()?,
            keys: self.keys.get_all()?,
        })
    }

    /// Save all data to disk
    pub fn save(&self) -> Result<(), HearthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HearthError::Io(format!("Failed to create store directory: {}", e))
            })?;
        }
        write_json_atomic(&self.path, &self.to_document()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, ShareScope, SharePermissions};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path().join("household.json")).unwrap();

        assert!(!storage.exists());
        assert_eq!(storage.users.count().unwrap(), 0);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("household.json");

        let storage = Storage::new(&path);
        let alex = HouseholdUser::new("Alex");
        let jordan = HouseholdUser::new("Jordan");
        storage
            .records
            .upsert(EntityRecord::new(alex.id, EntityType::Budget, BTreeMap::new()))
            .unwrap();
        storage
            .shares
            .upsert_share(DataShare::new(
                alex.id,
                jordan.id,
                ShareScope::All,
                SharePermissions::VIEW_ONLY,
            ))
            .unwrap();
        storage.users.upsert(alex).unwrap();
        storage.users.upsert(jordan).unwrap();
        storage.save().unwrap();

        let reloaded = Storage::open(&path).unwrap();
        assert_eq!(reloaded.users.count().unwrap(), 2);
        assert_eq!(reloaded.records.count().unwrap(), 1);
        assert_eq!(reloaded.shares.all_shares().unwrap().len(), 1);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("household.json");
        std::fs::write(&path, r#"{"schema_version": 99}"#).unwrap();

        assert!(Storage::open(&path).is_err());
    }
}
