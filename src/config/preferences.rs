//! Structured application preferences
//!
//! Typed user preferences persisted as `preferences.json`. Every write is
//! published to subscribers through a `tokio::sync::watch` channel, so
//! consumers see the latest snapshot without polling the file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use super::paths::FieldPaths;
use crate::error::{BackupError, BackupResult};
use crate::models::{PreferenceType, PreferenceValue};
use crate::storage::file_io::{read_json, write_json_atomic};

/// Every known key with its declared type
pub const PREFERENCE_KEYS: &[(&str, PreferenceType)] = &[
    ("technician_name", PreferenceType::Text),
    ("company_name", PreferenceType::Text),
    ("report_language", PreferenceType::Text),
    ("theme", PreferenceType::Text),
    ("photo_quality", PreferenceType::Int),
    ("auto_backup_enabled", PreferenceType::Bool),
    ("include_thumbnails", PreferenceType::Bool),
    ("last_sync_epoch_ms", PreferenceType::Long),
    ("signature_scale", PreferenceType::Float),
];

/// User preferences of the field-service app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppPreferences {
    pub technician_name: String,
    pub company_name: String,
    pub report_language: String,
    pub theme: String,
    /// JPEG quality used for new photos, 1-100
    pub photo_quality: i32,
    pub auto_backup_enabled: bool,
    pub include_thumbnails: bool,
    pub last_sync_epoch_ms: i64,
    pub signature_scale: f32,
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            technician_name: String::new(),
            company_name: String::new(),
            report_language: "en".into(),
            theme: "system".into(),
            photo_quality: 85,
            auto_backup_enabled: false,
            include_thumbnails: false,
            last_sync_epoch_ms: 0,
            signature_scale: 1.0,
        }
    }
}

impl AppPreferences {
    /// Declared type of a key, `None` for unknown keys
    pub fn declared_type(key: &str) -> Option<PreferenceType> {
        PREFERENCE_KEYS
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, kind)| *kind)
    }

    /// Read one preference
    pub fn get(&self, key: &str) -> Option<PreferenceValue> {
        let value = match key {
            "technician_name" => PreferenceValue::Text(self.technician_name.clone()),
            "company_name" => PreferenceValue::Text(self.company_name.clone()),
            "report_language" => PreferenceValue::Text(self.report_language.clone()),
            "theme" => PreferenceValue::Text(self.theme.clone()),
            "photo_quality" => PreferenceValue::Int(self.photo_quality),
            "auto_backup_enabled" => PreferenceValue::Bool(self.auto_backup_enabled),
            "include_thumbnails" => PreferenceValue::Bool(self.include_thumbnails),
            "last_sync_epoch_ms" => PreferenceValue::Long(self.last_sync_epoch_ms),
            "signature_scale" => PreferenceValue::Float(f64::from(self.signature_scale)),
            _ => return None,
        };
        Some(value)
    }

    /// Write one preference, checking the value against the declared type
    pub fn set(&mut self, key: &str, value: &PreferenceValue) -> BackupResult<()> {
        let mismatch = || {
            BackupError::Preferences(format!("{} does not accept {:?}", key, value))
        };

        match key {
            "technician_name" => self.technician_name = value.as_str().ok_or_else(mismatch)?.into(),
            "company_name" => self.company_name = value.as_str().ok_or_else(mismatch)?.into(),
            "report_language" => self.report_language = value.as_str().ok_or_else(mismatch)?.into(),
            "theme" => self.theme = value.as_str().ok_or_else(mismatch)?.into(),
            "photo_quality" => {
                self.photo_quality = value
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(mismatch)?
            }
            "auto_backup_enabled" => self.auto_backup_enabled = value.as_bool().ok_or_else(mismatch)?,
            "include_thumbnails" => self.include_thumbnails = value.as_bool().ok_or_else(mismatch)?,
            "last_sync_epoch_ms" => self.last_sync_epoch_ms = value.as_i64().ok_or_else(mismatch)?,
            "signature_scale" => self.signature_scale = value.as_f64().ok_or_else(mismatch)? as f32,
            _ => {
                return Err(BackupError::Preferences(format!(
                    "unknown preference key: {}",
                    key
                )))
            }
        }
        Ok(())
    }

    /// All preferences keyed by name
    pub fn entries(&self) -> BTreeMap<String, PreferenceValue> {
        PREFERENCE_KEYS
            .iter()
            .filter_map(|(key, _)| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }
}

/// The structured preference store backed by `preferences.json`
pub struct PreferenceFile {
    path: PathBuf,
    current: watch::Sender<AppPreferences>,
}

impl PreferenceFile {
    /// Open the store, starting from defaults if the file doesn't exist
    pub fn open(paths: &FieldPaths) -> BackupResult<Self> {
        let path = paths.preferences_file();
        let prefs: AppPreferences = read_json(&path)?;
        let (current, _) = watch::channel(prefs);
        Ok(Self { path, current })
    }

    /// Snapshot of the current preferences
    pub fn current(&self) -> AppPreferences {
        self.current.borrow().clone()
    }

    /// Receiver that always holds the latest preferences
    pub fn subscribe(&self) -> watch::Receiver<AppPreferences> {
        self.current.subscribe()
    }

    /// Apply a change, persist it and notify subscribers
    ///
    /// Nothing is written or published if `change` fails.
    pub fn update<F>(&self, change: F) -> BackupResult<()>
    where
        F: FnOnce(&mut AppPreferences) -> BackupResult<()>,
    {
        let mut next = self.current();
        change(&mut next)?;
        write_json_atomic(&self.path, &next)?;
        self.current.send_replace(next);
        debug!(path = %self.path.display(), "Preferences saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (PreferenceFile, FieldPaths, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let paths = FieldPaths::with_base_dir(temp_dir.path().to_path_buf());
        (PreferenceFile::open(&paths).unwrap(), paths, temp_dir)
    }

    #[test]
    fn test_defaults_without_file() {
        let (store, _paths, _temp) = open_store();
        assert_eq!(store.current(), AppPreferences::default());
    }

    #[test]
    fn test_every_key_round_trips() {
        let prefs = AppPreferences::default();
        let entries = prefs.entries();
        assert_eq!(entries.len(), PREFERENCE_KEYS.len());

        let mut copy = AppPreferences {
            theme: "dark".into(),
            ..AppPreferences::default()
        };
        for (key, value) in &entries {
            copy.set(key, value).unwrap();
        }
        assert_eq!(copy, prefs);
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let mut prefs = AppPreferences::default();
        assert!(prefs
            .set("photo_quality", &PreferenceValue::Text("high".into()))
            .is_err());
        assert!(prefs.set("nope", &PreferenceValue::Bool(true)).is_err());
        prefs
            .set("signature_scale", &PreferenceValue::Int(2))
            .unwrap();
        assert_eq!(prefs.signature_scale, 2.0);
    }

    #[test]
    fn test_update_persists_and_notifies() {
        let (store, paths, _temp) = open_store();
        let mut rx = store.subscribe();

        store
            .update(|p| {
                p.technician_name = "Marco".into();
                Ok(())
            })
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().technician_name, "Marco");

        let reopened = PreferenceFile::open(&paths).unwrap();
        assert_eq!(reopened.current().technician_name, "Marco");
    }

    #[test]
    fn test_failed_update_changes_nothing() {
        let (store, paths, _temp) = open_store();
        let rx = store.subscribe();

        let result = store.update(|p| p.set("photo_quality", &PreferenceValue::Bool(true)));

        assert!(result.is_err());
        assert!(!rx.has_changed().unwrap());
        assert!(!paths.preferences_file().exists());
    }
}
