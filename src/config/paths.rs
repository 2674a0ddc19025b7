//! Path management for field-backup
//!
//! Provides platform-aware path resolution for configuration, data, photos
//! and backups.
//!
//! ## Path Resolution Order
//!
//! 1. `FIELD_BACKUP_DATA_DIR` environment variable (if set)
//! 2. The platform data directory reported by `directories`
//!    (`~/.local/share/field-backup` on Linux)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::BackupError;

/// Name of the environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "FIELD_BACKUP_DATA_DIR";

/// Manages all paths used by field-backup
#[derive(Debug, Clone)]
pub struct FieldPaths {
    /// Base directory for all application data
    base_dir: PathBuf,
}

impl FieldPaths {
    /// Create a new FieldPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, BackupError> {
        let base_dir = if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create FieldPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory holding the table files
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the photo asset directory
    pub fn photos_dir(&self) -> PathBuf {
        self.base_dir.join("photos")
    }

    /// Get the thumbnail directory (inside the photo directory)
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.photos_dir().join("thumbnails")
    }

    /// Get the backup catalog directory
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the path to the engine settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the structured preference store
    pub fn preferences_file(&self) -> PathBuf {
        self.base_dir.join("preferences.json")
    }

    /// Get the path to the legacy flat preference store
    pub fn legacy_preferences_file(&self) -> PathBuf {
        self.base_dir.join("legacy_prefs.json")
    }

    /// Get the path to the JSON file backing one table
    pub fn table_file(&self, table: &str) -> PathBuf {
        self.data_dir().join(format!("{}.json", table))
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<(), BackupError> {
        for (label, dir) in [
            ("base", self.base_dir.clone()),
            ("data", self.data_dir()),
            ("photo", self.photos_dir()),
            ("thumbnail", self.thumbnails_dir()),
            ("backup", self.backup_dir()),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                BackupError::Io(format!("Failed to create {} directory: {}", label, e))
            })?;
        }

        Ok(())
    }
}

/// Resolve the default base directory for the current platform
fn resolve_default_path() -> Result<PathBuf, BackupError> {
    ProjectDirs::from("com", "fieldservice", "field-backup")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| BackupError::Config("Could not determine home directory".into()))
}
