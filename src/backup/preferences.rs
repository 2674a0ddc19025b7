//! Preference exporter/importer
//!
//! Flattens the legacy and the structured preference store into one string
//! map for the bundle. Legacy keys get a `legacy_` prefix so a key present in
//! both stores survives as two entries. Import routes each key back by that
//! prefix.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{AppPreferences, LegacyPreferenceFile, PreferenceFile};
use crate::device::DeviceInfoProvider;
use crate::error::{BackupError, BackupResult};
use crate::models::{DeviceInfo, PreferenceSnapshot, PreferenceType, PreferenceValue};

/// Prefix marking keys of the legacy store in a bundle
pub const LEGACY_PREFIX: &str = "legacy_";

/// Device facts compared on import
const COMPARED_DEVICE_FACTS: &[&str] = &["model", "os_name", "os_version"];

/// The older flat key-value store
pub trait LegacyPreferenceStore: Send + Sync {
    fn entries(&self) -> BackupResult<BTreeMap<String, PreferenceValue>>;
    fn put_all(&self, entries: BTreeMap<String, PreferenceValue>) -> BackupResult<()>;
}

/// The current typed store
pub trait StructuredPreferenceStore: Send + Sync {
    fn entries(&self) -> BackupResult<BTreeMap<String, PreferenceValue>>;
    /// `None` for keys this version doesn't know
    fn declared_type(&self, key: &str) -> Option<PreferenceType>;
    fn put_all(&self, entries: BTreeMap<String, PreferenceValue>) -> BackupResult<()>;
}

impl LegacyPreferenceStore for LegacyPreferenceFile {
    fn entries(&self) -> BackupResult<BTreeMap<String, PreferenceValue>> {
        LegacyPreferenceFile::entries(self)
    }

    fn put_all(&self, entries: BTreeMap<String, PreferenceValue>) -> BackupResult<()> {
        LegacyPreferenceFile::put_all(self, entries)
    }
}

impl StructuredPreferenceStore for PreferenceFile {
    fn entries(&self) -> BackupResult<BTreeMap<String, PreferenceValue>> {
        Ok(self.current().entries())
    }

    fn declared_type(&self, key: &str) -> Option<PreferenceType> {
        AppPreferences::declared_type(key)
    }

    fn put_all(&self, entries: BTreeMap<String, PreferenceValue>) -> BackupResult<()> {
        self.update(|prefs| {
            for (key, value) in &entries {
                prefs.set(key, value)?;
            }
            Ok(())
        })
    }
}

/// What a preference import did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceImportSummary {
    pub structured_written: usize,
    pub legacy_written: usize,
    /// Keys that were dropped: unknown, or not parseable as their type
    pub ignored: Vec<String>,
    /// Human-readable differences between the exporting and this device
    pub device_changes: Vec<String>,
}

/// Moves preferences between the stores and a [`PreferenceSnapshot`]
#[derive(Clone)]
pub struct PreferenceBackup {
    legacy: Arc<dyn LegacyPreferenceStore>,
    structured: Arc<dyn StructuredPreferenceStore>,
    device: Arc<dyn DeviceInfoProvider>,
}

impl PreferenceBackup {
    pub fn new(
        legacy: Arc<dyn LegacyPreferenceStore>,
        structured: Arc<dyn StructuredPreferenceStore>,
        device: Arc<dyn DeviceInfoProvider>,
    ) -> Self {
        Self {
            legacy,
            structured,
            device,
        }
    }

    /// Merge both stores into one map and capture the device facts
    pub fn export_preferences(&self, app_version: &str) -> BackupResult<PreferenceSnapshot> {
        let mut preferences = BTreeMap::new();

        for (key, value) in self.structured.entries()? {
            preferences.insert(key, value.to_string());
        }
        for (key, value) in self.legacy.entries()? {
            preferences.insert(format!("{}{}", LEGACY_PREFIX, key), value.to_string());
        }

        let mut device_info = device_facts(&self.device.device_info());
        device_info.insert("app_version".into(), app_version.to_string());

        debug!(count = preferences.len(), "Exported preferences");
        Ok(PreferenceSnapshot {
            preferences,
            device_info,
        })
    }

    /// Write a snapshot back into the stores
    ///
    /// Unknown keys are ignored. Device facts are only compared and logged.
    pub fn import_preferences(
        &self,
        snapshot: &PreferenceSnapshot,
    ) -> BackupResult<PreferenceImportSummary> {
        let mut summary = PreferenceImportSummary::default();
        let mut legacy = BTreeMap::new();
        let mut structured = BTreeMap::new();

        for (key, raw) in &snapshot.preferences {
            if let Some(legacy_key) = key.strip_prefix(LEGACY_PREFIX) {
                if legacy_key.is_empty() {
                    summary.ignored.push(key.clone());
                } else {
                    legacy.insert(legacy_key.to_string(), PreferenceValue::coerce(raw));
                }
                continue;
            }

            match self.structured.declared_type(key) {
                Some(kind) => match PreferenceValue::parse_as(kind, raw) {
                    Some(value) => {
                        structured.insert(key.clone(), value);
                    }
                    None => {
                        warn!(key = %key, value = %raw, "Preference value does not match its type");
                        summary.ignored.push(key.clone());
                    }
                },
                None => {
                    debug!(key = %key, "Ignoring unknown preference");
                    summary.ignored.push(key.clone());
                }
            }
        }

        summary.legacy_written = legacy.len();
        summary.structured_written = structured.len();

        if !legacy.is_empty() {
            self.legacy
                .put_all(legacy)
                .map_err(|e| BackupError::Preferences(format!("legacy store: {}", e)))?;
        }
        if !structured.is_empty() {
            self.structured
                .put_all(structured)
                .map_err(|e| BackupError::Preferences(format!("structured store: {}", e)))?;
        }

        summary.device_changes = self.compare_device(&snapshot.device_info);

        info!(
            structured = summary.structured_written,
            legacy = summary.legacy_written,
            ignored = summary.ignored.len(),
            "Imported preferences"
        );
        Ok(summary)
    }

    fn compare_device(&self, recorded: &BTreeMap<String, String>) -> Vec<String> {
        let current = device_facts(&self.device.device_info());
        let mut changes = Vec::new();

        for fact in COMPARED_DEVICE_FACTS {
            let (Some(then), Some(now)) = (recorded.get(*fact), current.get(*fact)) else {
                continue;
            };
            if then != now {
                warn!(fact = %fact, backup = %then, current = %now, "Device changed since backup");
                changes.push(format!("{}: {} -> {}", fact, then, now));
            }
        }
        changes
    }
}

fn device_facts(info: &DeviceInfo) -> BTreeMap<String, String> {
    [
        ("model", &info.model),
        ("os_name", &info.os_name),
        ("os_version", &info.os_version),
        ("arch", &info.arch),
        ("hostname", &info.hostname),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.clone()))
    .collect()
}
