//! Configuration module for field-backup
//!
//! This module provides configuration management including:
//! - Platform-aware path resolution
//! - Engine settings persistence
//! - The structured and legacy preference stores

pub mod legacy;
pub mod paths;
pub mod preferences;
pub mod settings;

pub use legacy::LegacyPreferenceFile;
pub use paths::FieldPaths;
pub use preferences::{AppPreferences, PreferenceFile};
pub use settings::{BackupSettings, Settings};
