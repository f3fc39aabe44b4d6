//! Household member repository

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::HearthError;
use crate::models::{HouseholdUser, UserId};

/// Repository for household members
pub struct UserRepository {
    data: RwLock<HashMap<UserId, HouseholdUser>>,
}

impl UserRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<UserId, HouseholdUser>>, HearthError> {
        self.data
            .read()
            .map_err(|e| HearthError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<UserId, HouseholdUser>>, HearthError> {
        self.data
            .write()
            .map_err(|e| HearthError::Storage(format!("Failed to acquire write lock: {}", e)))
    }

    /// Replace the contents with users loaded from disk
    pub fn replace_all(&self, users: Vec<HouseholdUser>) -> Result<(), HearthError> {
        let mut data = self.write()?;
        data.clear();
        for user in users {
            data.insert(user.id, user);
        }
        Ok(())
    }

    /// Get a user by ID
    pub fn get(&self, id: UserId) -> Result<Option<HouseholdUser>, HearthError> {
        Ok(self.read()?.get(&id).cloned())
    }

    /// Get a user by ID, failing if absent
    pub fn require(&self, id: UserId) -> Result<HouseholdUser, HearthError> {
        self.get(id)?
            .ok_or_else(|| HearthError::user_not_found(id.to_string()))
    }

    /// Get all users sorted by name
    pub fn get_all(&self) -> Result<Vec<HouseholdUser>, HearthError> {
        let mut users: Vec<_> = self.read()?.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    /// Get a user by name (case-insensitive)
    pub fn get_by_name(&self, name: &str) -> Result<Option<HouseholdUser>, HearthError> {
        let name_lower = name.to_lowercase();
        Ok(self
            .read()?
            .values()
            .find(|u| u.name.to_lowercase() == name_lower)
            .cloned())
    }

    /// Insert or update a user
    pub fn upsert(&self, user: HouseholdUser) -> Result<(), HearthError> {
        self.write()?.insert(user.id, user);
        Ok(())
    }

    /// Check if a name is taken by another user
    pub fn name_exists(&self, name: &str, exclude_id: Option<UserId>) -> Result<bool, HearthError> {
        let name_lower = name.to_lowercase();
        Ok(self
            .read()?
            .values()
            .any(|u| u.name.to_lowercase() == name_lower && Some(u.id) != exclude_id))
    }

    /// Count users
    pub fn count(&self) -> Result<usize, HearthError> {
        Ok(self.read()?.len())
    }
}

impl Default for UserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_get() {
        let repo = UserRepository::new();
        let user = HouseholdUser::new("Morgan");
        let id = user.id;

        repo.upsert(user).unwrap();

        assert_eq!(repo.get(id).unwrap().unwrap().name, "Morgan");
        assert!(repo.require(UserId::new()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_name_lookup_is_case_insensitive() {
        let repo = UserRepository::new();
        let user = HouseholdUser::new("Morgan");
        let id = user.id;
        repo.upsert(user).unwrap();

        assert!(repo.get_by_name("MORGAN").unwrap().is_some());
        assert!(repo.name_exists("morgan", None).unwrap());
        assert!(!repo.name_exists("morgan", Some(id)).unwrap());
    }

    #[test]
    fn test_replace_all() {
        let repo = UserRepository::new();
        repo.upsert(HouseholdUser::new("Old")).unwrap();
        repo.replace_all(vec![HouseholdUser::new("A"), HouseholdUser::new("B")])
            .unwrap();

        let names: Vec<_> = repo.get_all().unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
