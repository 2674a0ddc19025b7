//! Legacy flat preference store
//!
//! Older app versions kept preferences as one flat JSON object of scalars in
//! `legacy_prefs.json`. It is still read and written so backups carry it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use super::paths::FieldPaths;
use crate::error::{BackupError, BackupResult};
use crate::models::PreferenceValue;
use crate::storage::file_io::{read_json, write_json_atomic};

pub struct LegacyPreferenceFile {
    path: PathBuf,
    values: RwLock<BTreeMap<String, PreferenceValue>>,
}

impl LegacyPreferenceFile {
    pub fn open(paths: &FieldPaths) -> BackupResult<Self> {
        let path = paths.legacy_preferences_file();
        let values = read_json(&path)?;
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn get(&self, key: &str) -> BackupResult<Option<PreferenceValue>> {
        let values = self
            .values
            .read()
            .map_err(|e| BackupError::Preferences(format!("Failed to acquire read lock: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    pub fn entries(&self) -> BackupResult<BTreeMap<String, PreferenceValue>> {
        let values = self
            .values
            .read()
            .map_err(|e| BackupError::Preferences(format!("Failed to acquire read lock: {}", e)))?;
        Ok(values.clone())
    }

    /// Set several keys and save once
    pub fn put_all(&self, entries: BTreeMap<String, PreferenceValue>) -> BackupResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| BackupError::Preferences(format!("Failed to acquire write lock: {}", e)))?;
        let mut next = values.clone();
        next.extend(entries);
        write_json_atomic(&self.path, &next)?;
        *values = next;
        Ok(())
    }
}
