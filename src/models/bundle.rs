//! The backup bundle and its parts
//!
//! A bundle is the unit that gets checksummed and persisted as `backup.json`.
//! Photo bytes are not part of it; they live in the sibling `photos.zip`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BackupId, CheckItemId};
use super::records::{
    CheckItem, CheckupHeader, Client, Contact, Facility, Island, PhotoRecord, SparePart,
    SparePartUsage,
};

/// Version of the bundle document layout written by this build
pub const BUNDLE_SCHEMA_VERSION: u32 = 1;

/// Conflict policy used when re-applying a database snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestoreStrategy {
    /// Clear every table, then insert the snapshot
    #[default]
    ReplaceAll,
    /// Upsert by primary key, keeping rows the snapshot doesn't mention
    Merge,
}

impl fmt::Display for RestoreStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplaceAll => write!(f, "replace-all"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

impl FromStr for RestoreStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "replace-all" | "replace" => Ok(Self::ReplaceAll),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown restore strategy: {}", other)),
        }
    }
}

/// Kind of backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupKind {
    #[default]
    Full,
}

/// Description of the device that produced a backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeviceInfo {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub hostname: String,
}

/// Identity and summary of a backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub id: BackupId,
    pub app_version: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub device: DeviceInfo,
    #[serde(default)]
    pub kind: BackupKind,
    #[serde(default)]
    pub total_size_bytes: u64,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Strategy the producer suggested for restoring this backup
    #[serde(default)]
    pub restore_hint: Option<RestoreStrategy>,
    /// Bundle checksum, set once when the bundle is sealed
    #[serde(default)]
    pub checksum: Option<String>,
}

fn default_schema_version() -> u32 {
    BUNDLE_SCHEMA_VERSION
}

/// Every table of the relational store, in parent-before-child order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub islands: Vec<Island>,
    #[serde(default)]
    pub checkups: Vec<CheckupHeader>,
    #[serde(default)]
    pub check_items: Vec<CheckItem>,
    #[serde(default)]
    pub photos: Vec<PhotoRecord>,
    #[serde(default)]
    pub spare_parts: Vec<SparePart>,
    #[serde(default)]
    pub spare_part_usages: Vec<SparePartUsage>,
    pub exported_at: DateTime<Utc>,
}

impl DatabaseSnapshot {
    /// Number of tables a snapshot carries
    pub const TABLE_COUNT: usize = 9;

    /// An empty snapshot, used to clear a store
    pub fn empty(exported_at: DateTime<Utc>) -> Self {
        Self {
            clients: Vec::new(),
            facilities: Vec::new(),
            contacts: Vec::new(),
            islands: Vec::new(),
            checkups: Vec::new(),
            check_items: Vec::new(),
            photos: Vec::new(),
            spare_parts: Vec::new(),
            spare_part_usages: Vec::new(),
            exported_at,
        }
    }

    /// Record count per table, in insert order
    pub fn table_counts(&self) -> [(&'static str, usize); Self::TABLE_COUNT] {
        [
            ("clients", self.clients.len()),
            ("facilities", self.facilities.len()),
            ("contacts", self.contacts.len()),
            ("islands", self.islands.len()),
            ("checkups", self.checkups.len()),
            ("check_items", self.check_items.len()),
            ("photos", self.photos.len()),
            ("spare_parts", self.spare_parts.len()),
            ("spare_part_usages", self.spare_part_usages.len()),
        ]
    }

    /// Total number of records across all tables
    pub fn total_records(&self) -> usize {
        self.table_counts().iter().map(|(_, n)| n).sum()
    }

    /// Whether the snapshot holds no records at all
    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }
}

/// Flattened user preferences plus device facts captured at export time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PreferenceSnapshot {
    /// `legacy_`-prefixed keys come from the legacy flat store, the rest from
    /// the structured store
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    /// Diagnostic facts about the exporting device; never replayed
    #[serde(default)]
    pub device_info: BTreeMap<String, String>,
}

/// One archived photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoAssetRecord {
    pub check_item_id: CheckItemId,
    pub file_name: String,
    pub size_bytes: u64,
    /// SHA-256 of the file contents, lower-case hex
    pub hash: String,
    #[serde(default)]
    pub has_thumbnail: bool,
}

/// Present-tense description of the photo set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PhotoManifest {
    #[serde(default)]
    pub total_photos: usize,
    #[serde(default)]
    pub total_size_bytes: u64,
    #[serde(default)]
    pub photos: Vec<PhotoAssetRecord>,
    #[serde(default)]
    pub thumbnails_included: bool,
}

impl PhotoManifest {
    /// Build a manifest from its records, deriving the totals
    pub fn from_assets(photos: Vec<PhotoAssetRecord>, thumbnails_included: bool) -> Self {
        Self {
            total_photos: photos.len(),
            total_size_bytes: photos.iter().map(|p| p.size_bytes).sum(),
            photos,
            thumbnails_included,
        }
    }

    /// Whether the bundle declares any photos
    pub fn has_photos(&self) -> bool {
        self.total_photos > 0
    }
}

/// The complete backup document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub metadata: BackupMetadata,
    pub database: DatabaseSnapshot,
    #[serde(default)]
    pub preferences: PreferenceSnapshot,
    #[serde(default)]
    pub photo_manifest: PhotoManifest,
}

impl Bundle {
    /// Return the bundle with its checksum set
    ///
    /// Sealing is the last step before a bundle is persisted; the metadata is
    /// not touched afterwards.
    pub fn seal(mut self, checksum: String) -> Self {
        self.metadata.checksum = Some(checksum);
        self
    }

    /// Whether the bundle carries a checksum
    pub fn is_sealed(&self) -> bool {
        self.metadata.checksum.is_some()
    }
}

/// The parts of a bundle document needed for catalog listings
///
/// Deserializing this from a full document skips the database and
/// preferences.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleHeader {
    pub metadata: BackupMetadata,
    #[serde(default)]
    pub photo_manifest: PhotoManifestSummary,
}

/// Totals of a photo manifest without the per-photo records
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PhotoManifestSummary {
    #[serde(default)]
    pub total_photos: usize,
    #[serde(default)]
    pub total_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse_and_display() {
        assert_eq!("replace-all".parse::<RestoreStrategy>().unwrap(), RestoreStrategy::ReplaceAll);
        assert_eq!("REPLACE_ALL".parse::<RestoreStrategy>().unwrap(), RestoreStrategy::ReplaceAll);
        assert_eq!("merge".parse::<RestoreStrategy>().unwrap(), RestoreStrategy::Merge);
        assert!("upsert-ish".parse::<RestoreStrategy>().is_err());
        assert_eq!(RestoreStrategy::Merge.to_string(), "merge");
    }

    #[test]
    fn test_strategy_serializes_screaming() {
        let json = serde_json::to_string(&RestoreStrategy::ReplaceAll).unwrap();
        assert_eq!(json, "\"REPLACE_ALL\"");
    }

    #[test]
    fn test_snapshot_counts() {
        let mut snapshot = DatabaseSnapshot::empty(Utc::now());
        assert!(snapshot.is_empty());
        let client = Client::new("ACME");
        snapshot.facilities.push(Facility::new(client.id, "Plant 1"));
        snapshot.clients.push(client);
        assert_eq!(snapshot.total_records(), 2);
        assert_eq!(snapshot.table_counts().len(), DatabaseSnapshot::TABLE_COUNT);
    }

    #[test]
    fn test_manifest_totals() {
        let item = CheckItemId::new();
        let manifest = PhotoManifest::from_assets(
            vec![
                PhotoAssetRecord {
                    check_item_id: item,
                    file_name: "a.jpg".into(),
                    size_bytes: 10,
                    hash: "00".into(),
                    has_thumbnail: false,
                },
                PhotoAssetRecord {
                    check_item_id: item,
                    file_name: "b.jpg".into(),
                    size_bytes: 32,
                    hash: "11".into(),
                    has_thumbnail: true,
                },
            ],
            true,
        );
        assert_eq!(manifest.total_photos, 2);
        assert_eq!(manifest.total_size_bytes, 42);
        assert!(manifest.has_photos());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "app_version": "9.9.9",
            "created_at": "2025-01-01T00:00:00Z",
            "some_future_field": {"nested": true}
        }"#;
        let metadata: BackupMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.kind, BackupKind::Full);
        assert_eq!(metadata.schema_version, BUNDLE_SCHEMA_VERSION);
        assert!(metadata.checksum.is_none());
    }
}
