//! Service layer for Hearth
//!
//! Business logic on top of the storage and entity layers: validation,
//! ownership checks, and persistence after each change.

pub mod household;
pub mod records;
pub mod sharing;

pub use household::HouseholdService;
pub use records::RecordService;
pub use sharing::{DefaultUpdate, SharingService};
