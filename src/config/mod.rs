//! Configuration module for Hearth
//!
//! This module provides configuration management including:
//! - Platform path resolution
//! - Installation settings persistence

pub mod paths;
pub mod settings;

pub use paths::HearthPaths;
pub use settings::Settings;
