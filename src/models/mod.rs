//! Core data models for Hearth
//!
//! Household members, entity records, shares, and sharing defaults.

pub mod entity_type;
pub mod ids;
pub mod record;
pub mod share;
pub mod user;

pub use entity_type::{EntityType, ShareScope};
pub use ids::{DefaultId, RecordId, ShareId, UserId};
pub use record::EntityRecord;
pub use share::{Capability, DataShare, SharePermissions, SharingDefault};
pub use user::{HouseholdUser, KeySource, MemberKeyring};
