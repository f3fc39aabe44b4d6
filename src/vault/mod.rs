//! Whole-file vault
//!
//! Master-password protection of the household store at rest: the persisted
//! config, the on-disk envelope, the lock state machine, idle auto-lock, and
//! crash recovery.

pub mod auto_lock;
pub mod config;
pub mod envelope;
pub mod manager;
pub mod recovery;
pub mod session;

pub use auto_lock::{AutoLockTarget, AutoLockWatcher, Clock, IdleTimer, ManualClock, SystemClock};
pub use config::VaultConfig;
pub use envelope::VaultEnvelope;
pub use manager::{AtRestKey, VaultManager, VaultState, VaultStatus};
pub use recovery::{CrashRecoveryGuard, DiskState, RecoveryOutcome};
pub use session::SessionKey;
