//! Sharing models
//!
//! A `DataShare` grants one member access to another member's records; a
//! `SharingDefault` is a template materialized into shares as new records are
//! created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity_type::{EntityType, ShareScope};
use super::ids::{DefaultId, RecordId, ShareId, UserId};

/// What a recipient may do with shared records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SharePermissions {
    /// Fetch and decrypt the records
    pub view: bool,
    /// Include the records in combined (household) totals
    pub combine: bool,
    /// Include the records in reports
    pub reports: bool,
}

impl SharePermissions {
    /// Every permission, as the owner holds them
    pub const FULL: SharePermissions = SharePermissions {
        view: true,
        combine: true,
        reports: true,
    };

    /// View only
    pub const VIEW_ONLY: SharePermissions = SharePermissions {
        view: true,
        combine: false,
        reports: false,
    };

    /// Check a single capability
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::View => self.view,
            Capability::Combine => self.combine,
            Capability::Reports => self.reports,
        }
    }
}

/// A permission a read path requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Combine,
    Reports,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::View => write!(f, "view"),
            Self::Combine => write!(f, "combine"),
            Self::Reports => write!(f, "reports"),
        }
    }
}

/// A grant from an owner to a recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataShare {
    /// Unique identifier
    pub id: ShareId,

    /// Member whose records are shared
    pub owner_id: UserId,

    /// Member receiving access
    pub recipient_id: UserId,

    /// Entity type covered, or all
    pub scope: ShareScope,

    /// Set when the share was materialized for a single record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<RecordId>,

    /// Granted permissions
    pub permissions: SharePermissions,

    /// When the share was created
    pub created_at: DateTime<Utc>,

    /// When the share was last modified
    pub updated_at: DateTime<Utc>,
}

impl DataShare {
    /// Create a share covering a scope
    pub fn new(
        owner_id: UserId,
        recipient_id: UserId,
        scope: ShareScope,
        permissions: SharePermissions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ShareId::new(),
            owner_id,
            recipient_id,
            scope,
            entity_id: None,
            permissions,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a share for a single record
    pub fn for_entity(
        owner_id: UserId,
        recipient_id: UserId,
        entity_type: EntityType,
        entity_id: RecordId,
        permissions: SharePermissions,
    ) -> Self {
        let mut share = Self::new(owner_id, recipient_id, entity_type.into(), permissions);
        share.entity_id = Some(entity_id);
        share
    }

    /// How specific this share is for a given record; `None` if it does not apply
    ///
    /// Record-level shares rank above type shares, which rank above `all`.
    pub fn specificity(&self, entity_type: EntityType, entity_id: Option<RecordId>) -> Option<u8> {
        if !self.scope.covers(entity_type) {
            return None;
        }
        match (self.entity_id, entity_id) {
            (Some(shared), Some(requested)) if shared == requested => Some(3),
            (Some(_), _) => None,
            (None, _) => match self.scope {
                ShareScope::Type(_) => Some(2),
                ShareScope::All => Some(1),
            },
        }
    }
}

/// A template applied to new records for an (owner, recipient, type) tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingDefault {
    /// Unique identifier
    pub id: DefaultId,

    /// Member whose new records are shared
    pub owner_id: UserId,

    /// Member receiving access
    pub recipient_id: UserId,

    /// Entity type covered, or all
    pub entity_type: ShareScope,

    /// Permissions copied into materialized shares
    pub permissions: SharePermissions,

    /// When the default was created
    pub created_at: DateTime<Utc>,

    /// When the default was last modified
    pub updated_at: DateTime<Utc>,
}

impl SharingDefault {
    /// Create a new sharing default
    pub fn new(
        owner_id: UserId,
        recipient_id: UserId,
        entity_type: ShareScope,
        permissions: SharePermissions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DefaultId::new(),
            owner_id,
            recipient_id,
            entity_type,
            permissions,
            created_at: now,
            updated_at: now,
        }
    }
}
