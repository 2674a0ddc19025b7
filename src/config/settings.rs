//! Engine settings for field-backup
//!
//! Manages the knobs of the backup engine: what a backup includes by default,
//! the photo size caps and the I/O buffer size.

use serde::{Deserialize, Serialize};

use super::paths::FieldPaths;
use crate::error::BackupError;
use crate::models::RestoreStrategy;

/// Backup engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Include photos in new backups unless told otherwise
    #[serde(default = "default_true")]
    pub include_photos: bool,

    /// Include thumbnails in new backups unless told otherwise
    #[serde(default)]
    pub include_thumbnails: bool,

    /// Photos larger than this are skipped with a warning
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: u64,

    /// Archiving stops once the archive would grow past this size
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,

    /// Size of the chunk used when streaming file contents
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Strategy used by restores that don't name one
    #[serde(default)]
    pub default_strategy: RestoreStrategy,
}

fn default_true() -> bool {
    true
}

fn default_max_photo_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_max_archive_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_buffer_size() -> usize {
    64 * 1024
}

fn default_schema_version() -> u32 {
    1
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            include_photos: default_true(),
            include_thumbnails: false,
            max_photo_bytes: default_max_photo_bytes(),
            max_archive_bytes: default_max_archive_bytes(),
            buffer_size: default_buffer_size(),
            default_strategy: RestoreStrategy::default(),
        }
    }
}

/// Settings file for field-backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Backup engine settings
    #[serde(default)]
    pub backup: BackupSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            backup: BackupSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &FieldPaths) -> Result<Self, BackupError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                BackupError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                BackupError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &FieldPaths) -> Result<(), BackupError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            BackupError::Config(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(paths.settings_file(), contents).map_err(|e| {
            BackupError::Io(format!("Failed to write settings file: {}", e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.backup.include_photos);
        assert!(!settings.backup.include_thumbnails);
        assert_eq!(settings.backup.buffer_size, 64 * 1024);
        assert_eq!(settings.backup.default_strategy, RestoreStrategy::ReplaceAll);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = FieldPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.backup.include_thumbnails = true;
        settings.backup.max_photo_bytes = 1024;
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert!(loaded.backup.include_thumbnails);
        assert_eq!(loaded.backup.max_photo_bytes, 1024);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"backup": {"include_photos": false}}"#).unwrap();
        assert!(!settings.backup.include_photos);
        assert_eq!(settings.schema_version, 1);
        assert_eq!(settings.backup.max_archive_bytes, 2 * 1024 * 1024 * 1024);
    }
}
