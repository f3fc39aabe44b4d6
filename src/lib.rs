//! Hearth - encryption and key management for a household finance app
//!
//! This library protects a local-first household finance store at two layers:
//! the whole store is sealed at rest under a vault password, and individual
//! members can encrypt their own records and share them selectively.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `crypto`: Key derivation, AEAD, key wrapping and password hashing
//! - `models`: Members, records, shares and sharing defaults
//! - `storage`: JSON file storage layer
//! - `vault`: Whole-file encryption, locking and crash recovery
//! - `entity`: Per-record encryption and share authorization
//! - `services`: Business logic layer
//! - `commands`: Guarded request handling for the UI process
//! - `cli`: Command-line handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use hearth::commands::{Origin, VaultCommand, VaultContext};
//! use hearth::config::{HearthPaths, Settings};
//!
//! let paths = HearthPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let origin = Origin::trusted(&settings);
//! let mut ctx = VaultContext::open(paths, settings)?;
//! ctx.handle_vault(&origin, VaultCommand::Status)?;
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod entity;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod vault;

pub use error::{HearthError, HearthResult};
