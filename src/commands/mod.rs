//! Request handling for the UI process
//!
//! All requests run against one [`VaultContext`] and pass through its guard:
//! origin check, auto-lock expiry, then lock state.

pub mod broadcast;
pub mod context;
pub mod household;
pub mod sharing;
pub mod vault;

pub use broadcast::{LockBroadcaster, LockEvent, LockReason};
pub use context::{Origin, VaultContext};
pub use sharing::{SharingCommand, SharingResponse};
pub use vault::{VaultCommand, VaultResponse};
