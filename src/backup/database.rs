//! Relational exporter/importer contract
//!
//! The backup engine never touches tables directly. It goes through
//! [`RecordStore`], which the storage layer implements.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::error::BackupResult;
use crate::models::{DatabaseSnapshot, Record, RestoreStrategy};

/// Estimated bytes a single record contributes to a bundle document
pub const BYTES_PER_RECORD: u64 = 512;

/// Whole-store export/import capability of the relational layer
pub trait RecordStore: Send + Sync {
    /// Serialize every table into a snapshot
    fn export_all_tables(&self) -> BackupResult<DatabaseSnapshot>;

    /// Apply a snapshot under the given strategy
    ///
    /// The store does not wrap the tables in one transaction; callers that
    /// need all-or-nothing semantics provide them below this layer.
    fn import_all_tables(
        &self,
        snapshot: &DatabaseSnapshot,
        strategy: RestoreStrategy,
    ) -> BackupResult<ImportSummary>;

    /// Check the store for structural problems
    fn validate_database_integrity(&self) -> BackupResult<IntegrityReport>;

    /// Cheap record count used for size estimates
    fn estimated_record_count(&self) -> BackupResult<u64>;
}

/// What an import did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub strategy: RestoreStrategy,
    pub tables: usize,
    pub records_deleted: usize,
    pub records_written: usize,
}

/// Outcome of an integrity check
///
/// Errors block a backup; warnings are only logged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntegrityReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl IntegrityReport {
    /// No errors were found
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// One-line description of the errors
    pub fn error_summary(&self) -> String {
        match self.errors.len() {
            0 => "no errors".to_string(),
            1 => self.errors[0].clone(),
            n => format!("{} (and {} more)", self.errors[0], n - 1),
        }
    }
}

/// Empty every table of the store
pub fn clear_all_data(store: &dyn RecordStore) -> BackupResult<ImportSummary> {
    store.import_all_tables(&DatabaseSnapshot::empty(Utc::now()), RestoreStrategy::ReplaceAll)
}

fn keys<R: Record>(records: &[R]) -> HashSet<Uuid> {
    records.iter().map(Record::key).collect()
}

/// Check a snapshot's references and required fields
///
/// Orphaned foreign keys and photos without a file are errors: imports insert
/// parents before children and would otherwise leave dangling rows.
pub fn check_snapshot_integrity(snapshot: &DatabaseSnapshot) -> IntegrityReport {
    let mut report = IntegrityReport::default();

    let clients = keys(&snapshot.clients);
    let facilities = keys(&snapshot.facilities);
    let islands = keys(&snapshot.islands);
    let checkups = keys(&snapshot.checkups);
    let check_items = keys(&snapshot.check_items);
    let spare_parts = keys(&snapshot.spare_parts);

    for client in &snapshot.clients {
        if client.name.trim().is_empty() {
            report
                .warnings
                .push(format!("Client {} has an empty name", client.id));
        }
    }

    for facility in &snapshot.facilities {
        if !clients.contains(facility.client_id.as_uuid()) {
            report.errors.push(format!(
                "Facility {} references missing client {}",
                facility.id, facility.client_id
            ));
        }
    }

    for contact in &snapshot.contacts {
        if !clients.contains(contact.client_id.as_uuid()) {
            report.errors.push(format!(
                "Contact {} references missing client {}",
                contact.id, contact.client_id
            ));
        }
    }

    for island in &snapshot.islands {
        if !facilities.contains(island.facility_id.as_uuid()) {
            report.errors.push(format!(
                "Island {} references missing facility {}",
                island.id, island.facility_id
            ));
        }
    }

    for checkup in &snapshot.checkups {
        if !islands.contains(checkup.island_id.as_uuid()) {
            report.errors.push(format!(
                "Checkup {} references missing island {}",
                checkup.id, checkup.island_id
            ));
        }
    }

    let mut checkups_with_items = HashSet::new();
    for item in &snapshot.check_items {
        checkups_with_items.insert(*item.checkup_id.as_uuid());
        if !checkups.contains(item.checkup_id.as_uuid()) {
            report.errors.push(format!(
                "Check item {} references missing checkup {}",
                item.id, item.checkup_id
            ));
        }
    }

    for checkup in &snapshot.checkups {
        if !checkups_with_items.contains(checkup.id.as_uuid()) {
            report
                .warnings
                .push(format!("Checkup {} has no check items", checkup.id));
        }
    }

    for photo in &snapshot.photos {
        if photo.file_name.trim().is_empty() {
            report
                .errors
                .push(format!("Photo {} has no file name", photo.id));
        }
        if !check_items.contains(photo.check_item_id.as_uuid()) {
            report.errors.push(format!(
                "Photo {} references missing check item {}",
                photo.id, photo.check_item_id
            ));
        }
    }

    for part in &snapshot.spare_parts {
        if part.code.trim().is_empty() {
            report
                .warnings
                .push(format!("Spare part {} has an empty code", part.id));
        }
    }

    for usage in &snapshot.spare_part_usages {
        if !check_items.contains(usage.check_item_id.as_uuid()) {
            report.errors.push(format!(
                "Spare part usage {} references missing check item {}",
                usage.id, usage.check_item_id
            ));
        }
        if !spare_parts.contains(usage.spare_part_id.as_uuid()) {
            report.errors.push(format!(
                "Spare part usage {} references missing spare part {}",
                usage.id, usage.spare_part_id
            ));
        }
        if usage.quantity == 0 {
            report
                .warnings
                .push(format!("Spare part usage {} has zero quantity", usage.id));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CheckItem, CheckItemId, CheckupHeader, Client, Facility, Island, PhotoRecord, SparePart,
        SparePartUsage,
    };

    fn consistent_snapshot() -> DatabaseSnapshot {
        let mut snapshot = DatabaseSnapshot::empty(Utc::now());
        let client = Client::new("ACME");
        let facility = Facility::new(client.id, "Plant");
        let island = Island::new(facility.id, "SN-1");
        let checkup = CheckupHeader::new(island.id, "Marco");
        let item = CheckItem::new(checkup.id, "Guard rails");
        let part = SparePart::new("P-1", "Fuse");
        snapshot
            .photos
            .push(PhotoRecord::new(item.id, "guard.jpg"));
        snapshot
            .spare_part_usages
            .push(SparePartUsage::new(item.id, part.id, 2));
        snapshot.clients.push(client);
        snapshot.facilities.push(facility);
        snapshot.islands.push(island);
        snapshot.checkups.push(checkup);
        snapshot.check_items.push(item);
        snapshot.spare_parts.push(part);
        snapshot
    }

    #[test]
    fn test_consistent_snapshot_is_valid() {
        let report = check_snapshot_integrity(&consistent_snapshot());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_orphaned_photo_is_an_error() {
        let mut snapshot = consistent_snapshot();
        snapshot
            .photos
            .push(PhotoRecord::new(CheckItemId::new(), "lost.jpg"));

        let report = check_snapshot_integrity(&snapshot);
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("missing check item"));
    }

    #[test]
    fn test_blank_names_are_warnings() {
        let mut snapshot = consistent_snapshot();
        snapshot.clients[0].name = "  ".into();
        snapshot.spare_part_usages[0].quantity = 0;

        let report = check_snapshot_integrity(&snapshot);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_error_summary() {
        let report = IntegrityReport {
            errors: vec!["first".into(), "second".into()],
            warnings: Vec::new(),
        };
        assert_eq!(report.error_summary(), "first (and 1 more)");
    }
}
