//! Core data models for field-backup
//!
//! This module contains the records of the field-service tables and the
//! documents a backup is made of: metadata, database snapshot, preference
//! snapshot and photo manifest.

pub mod bundle;
pub mod ids;
pub mod preference;
pub mod records;

pub use bundle::{
    BackupKind, BackupMetadata, Bundle, BundleHeader, DatabaseSnapshot, DeviceInfo,
    PhotoAssetRecord, PhotoManifest, PreferenceSnapshot, RestoreStrategy, BUNDLE_SCHEMA_VERSION,
};
pub use ids::{
    BackupId, CheckItemId, CheckupId, ClientId, ContactId, FacilityId, IslandId, PhotoId,
    SparePartId, SparePartUsageId,
};
pub use preference::{PreferenceType, PreferenceValue};
pub use records::{
    CheckItem, CheckOutcome, CheckupHeader, CheckupStatus, Client, Contact, Facility, Island,
    PhotoRecord, Record, SparePart, SparePartUsage,
};
