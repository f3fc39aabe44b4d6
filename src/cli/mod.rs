//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the request layer.

pub mod member;
pub mod prompt;
pub mod record;
pub mod share;
pub mod vault;

pub use member::{handle_member_command, MemberCommands};
pub use record::{handle_record_command, RecordCommands};
pub use share::{handle_share_command, ShareCommands};
pub use vault::{ensure_unlocked, handle_vault_command, VaultCommands};
