//! Storage layer for field-backup
//!
//! Provides the JSON-file relational store the backup engine snapshots:
//! one [`TableRepository`] per table, atomic writes, and automatic directory
//! creation.

pub mod file_io;
pub mod table;

pub use file_io::{read_json, read_json_required, write_json_atomic};
pub use table::TableRepository;

use tracing::debug;

use crate::backup::database::{
    check_snapshot_integrity, ImportSummary, IntegrityReport, RecordStore,
};
use crate::backup::photos::PhotoIndex;
use crate::config::paths::FieldPaths;
use crate::error::{BackupError, BackupResult};
use crate::models::{
    CheckItem, CheckupHeader, Client, Contact, DatabaseSnapshot, Facility, Island, PhotoRecord,
    Record, RestoreStrategy, SparePart, SparePartUsage,
};

/// Main storage coordinator that provides access to all tables
pub struct Storage {
    paths: FieldPaths,
    pub clients: TableRepository<Client>,
    pub facilities: TableRepository<Facility>,
    pub contacts: TableRepository<Contact>,
    pub islands: TableRepository<Island>,
    pub checkups: TableRepository<CheckupHeader>,
    pub check_items: TableRepository<CheckItem>,
    pub photos: TableRepository<PhotoRecord>,
    pub spare_parts: TableRepository<SparePart>,
    pub spare_part_usages: TableRepository<SparePartUsage>,
}

fn table<R>(paths: &FieldPaths) -> TableRepository<R>
where
    R: Record + Clone + serde::Serialize + serde::de::DeserializeOwned,
{
    TableRepository::new(paths.table_file(R::TABLE))
}

impl Storage {
    /// Create a new Storage instance
    pub fn new(paths: FieldPaths) -> Result<Self, BackupError> {
        paths.ensure_directories()?;

        Ok(Self {
            clients: table(&paths),
            facilities: table(&paths),
            contacts: table(&paths),
            islands: table(&paths),
            checkups: table(&paths),
            check_items: table(&paths),
            photos: table(&paths),
            spare_parts: table(&paths),
            spare_part_usages: table(&paths),
            paths,
        })
    }

    /// Create a Storage instance and load every table from disk
    pub fn open(paths: FieldPaths) -> Result<Self, BackupError> {
        let storage = Self::new(paths)?;
        storage.load_all()?;
        Ok(storage)
    }

    /// Get the paths configuration
    pub fn paths(&self) -> &FieldPaths {
        &self.paths
    }

    /// Load all data from disk
    pub fn load_all(&self) -> Result<(), BackupError> {
        self.clients.load()?;
        self.facilities.load()?;
        self.contacts.load()?;
        self.islands.load()?;
        self.checkups.load()?;
        self.check_items.load()?;
        self.photos.load()?;
        self.spare_parts.load()?;
        self.spare_part_usages.load()?;
        Ok(())
    }

    /// Save all data to disk
    pub fn save_all(&self) -> Result<(), BackupError> {
        self.clients.save()?;
        self.facilities.save()?;
        self.contacts.save()?;
        self.islands.save()?;
        self.checkups.save()?;
        self.check_items.save()?;
        self.photos.save()?;
        self.spare_parts.save()?;
        self.spare_part_usages.save()?;
        Ok(())
    }

    /// Delete every row, children before parents
    fn clear_all_tables(&self) -> Result<usize, BackupError> {
        Ok(self.spare_part_usages.clear()?
            + self.photos.clear()?
            + self.check_items.clear()?
            + self.checkups.clear()?
            + self.islands.clear()?
            + self.contacts.clear()?
            + self.facilities.clear()?
            + self.spare_parts.clear()?
            + self.clients.clear()?)
    }

    /// Upsert a snapshot's rows, parents before children
    fn write_snapshot(&self, snapshot: &DatabaseSnapshot) -> Result<usize, BackupError> {
        Ok(self.clients.upsert_all(&snapshot.clients)?
            + self.facilities.upsert_all(&snapshot.facilities)?
            + self.contacts.upsert_all(&snapshot.contacts)?
            + self.islands.upsert_all(&snapshot.islands)?
            + self.checkups.upsert_all(&snapshot.checkups)?
            + self.check_items.upsert_all(&snapshot.check_items)?
            + self.photos.upsert_all(&snapshot.photos)?
            + self.spare_parts.upsert_all(&snapshot.spare_parts)?
            + self.spare_part_usages.upsert_all(&snapshot.spare_part_usages)?)
    }
}

impl RecordStore for Storage {
    fn export_all_tables(&self) -> BackupResult<DatabaseSnapshot> {
        Ok(DatabaseSnapshot {
            clients: self.clients.get_all()?,
            facilities: self.facilities.get_all()?,
            contacts: self.contacts.get_all()?,
            islands: self.islands.get_all()?,
            checkups: self.checkups.get_all()?,
            check_items: self.check_items.get_all()?,
            photos: self.photos.get_all()?,
            spare_parts: self.spare_parts.get_all()?,
            spare_part_usages: self.spare_part_usages.get_all()?,
            exported_at: chrono::Utc::now(),
        })
    }

    fn import_all_tables(
        &self,
        snapshot: &DatabaseSnapshot,
        strategy: RestoreStrategy,
    ) -> BackupResult<ImportSummary> {
        let records_deleted = match strategy {
            RestoreStrategy::ReplaceAll => self.clear_all_tables()?,
            RestoreStrategy::Merge => 0,
        };
        let records_written = self.write_snapshot(snapshot)?;
        self.save_all()?;

        debug!(
            %strategy,
            records_deleted, records_written, "Imported database snapshot"
        );

        Ok(ImportSummary {
            strategy,
            tables: DatabaseSnapshot::TABLE_COUNT,
            records_deleted,
            records_written,
        })
    }

    fn validate_database_integrity(&self) -> BackupResult<IntegrityReport> {
        Ok(check_snapshot_integrity(&self.export_all_tables()?))
    }

    fn estimated_record_count(&self) -> BackupResult<u64> {
        let total = self.clients.len()?
            + self.facilities.len()?
            + self.contacts.len()?
            + self.islands.len()?
            + self.checkups.len()?
            + self.check_items.len()?
            + self.photos.len()?
            + self.spare_parts.len()?
            + self.spare_part_usages.len()?;
        Ok(total as u64)
    }
}

impl PhotoIndex for Storage {
    fn photo_records(&self) -> BackupResult<Vec<PhotoRecord>> {
        self.photos.get_all()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backup::database::clear_all_data;
    use chrono::TimeZone;
    use tempfile::TempDir;

    /// Fill a store with one small, consistent client tree
    pub(crate) fn seed(storage: &Storage) -> DatabaseSnapshot {
        let client = Client::new("ACME");
        let facility = Facility::new(client.id, "Plant 1");
        let contact = Contact::new(client.id, "Giulia");
        let island = Island::new(facility.id, "SN-100");
        let checkup = CheckupHeader::new(island.id, "Marco");
        let item = CheckItem::new(checkup.id, "Emergency stop");
        let photo = PhotoRecord::new(item.id, "estop.jpg");
        let part = SparePart::new("F-10", "Fuse 10A");
        let usage = SparePartUsage::new(item.id, part.id, 1);

        storage.clients.upsert(client).unwrap();
        storage.facilities.upsert(facility).unwrap();
        storage.contacts.upsert(contact).unwrap();
        storage.islands.upsert(island).unwrap();
        storage.checkups.upsert(checkup).unwrap();
        storage.check_items.upsert(item).unwrap();
        storage.photos.upsert(photo).unwrap();
        storage.spare_parts.upsert(part).unwrap();
        storage.spare_part_usages.upsert(usage).unwrap();
        storage.save_all().unwrap();

        storage.export_all_tables().unwrap()
    }

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let paths = FieldPaths::with_base_dir(temp_dir.path().to_path_buf());
        (Storage::new(paths).unwrap(), temp_dir)
    }

    fn without_timestamp(mut snapshot: DatabaseSnapshot) -> DatabaseSnapshot {
        snapshot.exported_at = chrono::Utc.timestamp_opt(0, 0).unwrap();
        snapshot
    }

    #[test]
    fn test_storage_creation() {
        let (_storage, temp) = create_test_storage();
        assert!(temp.path().join("data").exists());
        assert!(temp.path().join("backups").exists());
    }

    #[test]
    fn test_export_import_round_trip() {
        let (source, _t1) = create_test_storage();
        let exported = seed(&source);

        let (target, _t2) = create_test_storage();
        target
            .import_all_tables(&exported, RestoreStrategy::ReplaceAll)
            .unwrap();

        let reexported = target.export_all_tables().unwrap();
        assert_eq!(without_timestamp(exported), without_timestamp(reexported));
    }

    #[test]
    fn test_replace_all_removes_unrelated_rows() {
        let (source, _t1) = create_test_storage();
        let exported = seed(&source);

        let (target, _t2) = create_test_storage();
        let preexisting = seed(&target);
        target.clients.upsert(Client::new("Orphan Co")).unwrap();

        let summary = target
            .import_all_tables(&exported, RestoreStrategy::ReplaceAll)
            .unwrap();
        assert_eq!(summary.records_deleted, preexisting.total_records() + 1);
        assert_eq!(summary.records_written, exported.total_records());

        let after = target.export_all_tables().unwrap();
        assert_eq!(after.total_records(), exported.total_records());
        for client in &preexisting.clients {
            assert!(!target.clients.contains(client.key()).unwrap());
        }
        assert_eq!(without_timestamp(after), without_timestamp(exported));
    }

    #[test]
    fn test_merge_keeps_existing_rows() {
        let (source, _t1) = create_test_storage();
        let exported = seed(&source);

        let (target, _t2) = create_test_storage();
        let preexisting = seed(&target);

        let summary = target
            .import_all_tables(&exported, RestoreStrategy::Merge)
            .unwrap();
        assert_eq!(summary.records_deleted, 0);

        let after = target.export_all_tables().unwrap();
        assert_eq!(
            after.total_records(),
            preexisting.total_records() + exported.total_records()
        );
    }

    #[test]
    fn test_import_persists_to_disk() {
        let (source, _t1) = create_test_storage();
        let exported = seed(&source);

        let (target, temp) = create_test_storage();
        target
            .import_all_tables(&exported, RestoreStrategy::ReplaceAll)
            .unwrap();

        let reopened = Storage::open(FieldPaths::with_base_dir(temp.path().to_path_buf())).unwrap();
        assert_eq!(
            reopened.estimated_record_count().unwrap(),
            exported.total_records() as u64
        );
    }

    #[test]
    fn test_clear_all_data() {
        let (storage, _temp) = create_test_storage();
        seed(&storage);

        let summary = clear_all_data(&storage).unwrap();
        assert_eq!(summary.records_deleted, 9);
        assert_eq!(storage.estimated_record_count().unwrap(), 0);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let (storage, _temp) = create_test_storage();
        seed(&storage);
        storage
            .photos
            .upsert(PhotoRecord::new(crate::models::CheckItemId::new(), "x.jpg"))
            .unwrap();

        let first = storage.validate_database_integrity().unwrap();
        let second = storage.validate_database_integrity().unwrap();
        assert!(!first.is_valid());
        assert_eq!(first, second);
    }
}
