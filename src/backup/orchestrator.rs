//! Backup orchestrator
//!
//! Sequences the sub-backups into one run and drives restores back through
//! them. Every run happens on tokio's blocking pool and reports through a
//! [`ProgressStream`].
//!
//! # Catalog layout
//!
//! ```text
//! backups/
//!   <backup id>/
//!     backup.json     sealed bundle document
//!     photos.zip      photo archive, when photos were included
//!   .<backup id>.partial/   run in progress, never listed
//! ```
//!
//! A run writes into its staging directory and renames it into place as its
//! last step, so the catalog only ever shows complete, checksummed backups.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::archive::{ArchiveReader, THUMBNAIL_DIR};
use super::checksum;
use super::database::{check_snapshot_integrity, RecordStore, BYTES_PER_RECORD};
use super::photos::{PhotoArchiveLimits, PhotoArchiver};
use super::preferences::PreferenceBackup;
use super::progress::{
    BackupProgress, BackupStage, ProgressSender, ProgressStream, RestoreProgress, RestoreStage,
};
use crate::config::{FieldPaths, LegacyPreferenceFile, PreferenceFile, Settings};
use crate::device::{Clock, DeviceInfoProvider, SystemClock, SystemDeviceInfo};
use crate::error::{BackupError, BackupResult};
use crate::models::{
    BackupId, BackupKind, BackupMetadata, Bundle, BundleHeader, DatabaseSnapshot, PhotoManifest,
    RestoreStrategy, BUNDLE_SCHEMA_VERSION,
};
use crate::storage::file_io::{dir_size, read_json_required, remove_dir_if_exists, write_json_atomic};
use crate::storage::Storage;

/// File name of the bundle document inside a backup directory
pub const BUNDLE_FILE: &str = "backup.json";

/// File name of the photo archive inside a backup directory
pub const PHOTO_ARCHIVE_FILE: &str = "photos.zip";

/// Fixed allowance for preferences in size estimates
pub const PREFERENCE_ALLOWANCE_BYTES: u64 = 16 * 1024;

/// Version recorded in new backups
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Catalog entry for one backup
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub id: BackupId,
    /// Backup directory
    pub path: PathBuf,
    pub bundle_path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Bytes on disk, bundle and archive together
    pub size_bytes: u64,
    pub description: Option<String>,
    pub photo_count: usize,
    pub app_version: String,
    pub restore_hint: Option<RestoreStrategy>,
}

/// Result of validating a backup without restoring it
#[derive(Debug, Clone, Default)]
pub struct BackupValidation {
    pub bundle_path: PathBuf,
    pub backup_id: Option<BackupId>,
    pub created_at: Option<DateTime<Utc>>,
    pub schema_version: Option<u32>,
    pub checksum_valid: bool,
    pub record_count: usize,
    pub photo_count: usize,
    pub photo_archive_present: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl BackupValidation {
    /// Safe to restore
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.checksum_valid
    }

    /// One-line status
    pub fn summary(&self) -> String {
        if self.is_valid() {
            if self.warnings.is_empty() {
                "Valid".to_string()
            } else {
                format!("Valid with {} warning(s)", self.warnings.len())
            }
        } else {
            format!("Invalid: {}", self.errors.join("; "))
        }
    }
}

/// Sequences backups and restores over the record, preference and photo
/// subsystems
#[derive(Clone)]
pub struct BackupOrchestrator {
    backup_dir: PathBuf,
    records: Arc<dyn RecordStore>,
    preferences: PreferenceBackup,
    photos: PhotoArchiver,
    device: Arc<dyn DeviceInfoProvider>,
    clock: Arc<dyn Clock>,
}

impl BackupOrchestrator {
    pub fn new(
        backup_dir: PathBuf,
        records: Arc<dyn RecordStore>,
        preferences: PreferenceBackup,
        photos: PhotoArchiver,
        device: Arc<dyn DeviceInfoProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backup_dir,
            records,
            preferences,
            photos,
            device,
            clock,
        }
    }

    /// Wire the orchestrator to the on-disk stores under `paths`
    pub fn from_paths(paths: &FieldPaths, settings: &Settings) -> BackupResult<Self> {
        let storage = Arc::new(Storage::open(paths.clone())?);
        let device: Arc<dyn DeviceInfoProvider> = Arc::new(SystemDeviceInfo);

        let preferences = PreferenceBackup::new(
            Arc::new(LegacyPreferenceFile::open(paths)?),
            Arc::new(PreferenceFile::open(paths)?),
            device.clone(),
        );
        let photos = PhotoArchiver::new(
            storage.clone(),
            paths.photos_dir(),
            PhotoArchiveLimits::from(&settings.backup),
        );

        Ok(Self::new(
            paths.backup_dir(),
            storage,
            preferences,
            photos,
            device,
            Arc::new(SystemClock),
        ))
    }

    /// Directory holding the backup catalog
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Take a full backup
    ///
    /// Must be called from within a tokio runtime.
    pub fn create_full_backup(
        &self,
        include_photos: bool,
        include_thumbnails: bool,
        restore_hint: Option<RestoreStrategy>,
        description: Option<String>,
    ) -> ProgressStream<BackupProgress> {
        let orchestrator = self.clone();
        ProgressStream::spawn(move |sender| {
            orchestrator.run_backup(
                sender,
                include_photos,
                include_thumbnails,
                restore_hint,
                description,
            )
        })
    }

    /// Restore a bundle and, if it declares photos, the archive next to it
    ///
    /// Must be called from within a tokio runtime.
    pub fn restore_from_backup(
        &self,
        archive_dir: PathBuf,
        bundle_path: PathBuf,
        strategy: RestoreStrategy,
    ) -> ProgressStream<RestoreProgress> {
        let orchestrator = self.clone();
        ProgressStream::spawn(move |sender| {
            orchestrator.run_restore(sender, &archive_dir, &bundle_path, strategy)
        })
    }

    /// Restore a cataloged backup by id
    pub fn restore_backup(
        &self,
        id: &BackupId,
        strategy: RestoreStrategy,
    ) -> BackupResult<ProgressStream<RestoreProgress>> {
        let dir = self.backup_dir.join(id.to_string());
        if !dir.join(BUNDLE_FILE).is_file() {
            return Err(BackupError::backup_not_found(id.to_string()));
        }
        Ok(self.restore_from_backup(dir.clone(), dir.join(BUNDLE_FILE), strategy))
    }

    fn run_backup(
        &self,
        sender: &ProgressSender<BackupProgress>,
        include_photos: bool,
        include_thumbnails: bool,
        restore_hint: Option<RestoreStrategy>,
        description: Option<String>,
    ) -> BackupResult<BackupProgress> {
        let started = Instant::now();
        let id = BackupId::new();
        info!(backup_id = %id, include_photos, include_thumbnails, "Starting backup");

        report(sender, BackupStage::Initializing, 0, format!("Starting backup {}", id))?;
        fs::create_dir_all(&self.backup_dir)
            .map_err(|e| BackupError::from(e).during(BackupStage::Initializing.label()))?;

        let staging = self.backup_dir.join(format!(".{}.partial", id));
        let result = self.stage_backup(
            sender,
            &id,
            &staging,
            include_photos,
            include_thumbnails,
            restore_hint,
            description,
        );

        match result {
            Ok(final_dir) => {
                let total_size = dir_size(&final_dir)?;
                let duration = started.elapsed();
                info!(
                    backup_id = %id,
                    total_size,
                    duration_ms = duration.as_millis() as u64,
                    "Backup complete"
                );
                Ok(BackupProgress::Completed {
                    backup_id: id,
                    path: final_dir,
                    total_size,
                    duration,
                    table_count: DatabaseSnapshot::TABLE_COUNT,
                })
            }
            Err(e) => {
                if let Err(cleanup) = remove_dir_if_exists(&staging) {
                    warn!(error = %cleanup, path = %staging.display(), "Failed to remove staging directory");
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn stage_backup(
        &self,
        sender: &ProgressSender<BackupProgress>,
        id: &BackupId,
        staging: &Path,
        include_photos: bool,
        include_thumbnails: bool,
        restore_hint: Option<RestoreStrategy>,
        description: Option<String>,
    ) -> BackupResult<PathBuf> {
        // Database validation
        let stage = BackupStage::ValidatingDatabase;
        report(sender, stage, 5, "Validating database integrity")?;
        let integrity = self
            .records
            .validate_database_integrity()
            .map_err(|e| e.during(stage.label()))?;
        for warning in &integrity.warnings {
            warn!(warning = %warning, "Database integrity warning");
        }
        if !integrity.is_valid() {
            return Err(BackupError::Validation(integrity.error_summary()).during(stage.label()));
        }
        report(
            sender,
            stage,
            9,
            format!("Database valid ({} warning(s))", integrity.warnings.len()),
        )?;

        // Database export
        let stage = BackupStage::ExportingDatabase;
        report(sender, stage, 10, "Exporting tables")?;
        let database = self
            .records
            .export_all_tables()
            .map_err(|e| e.during(stage.label()))?;
        report(
            sender,
            stage,
            30,
            format!(
                "Exported {} records from {} tables",
                database.total_records(),
                DatabaseSnapshot::TABLE_COUNT
            ),
        )?;

        // Preference export
        let stage = BackupStage::ExportingPreferences;
        report(sender, stage, 31, "Exporting preferences")?;
        let preferences = self
            .preferences
            .export_preferences(APP_VERSION)
            .map_err(|e| e.during(stage.label()))?;
        report(
            sender,
            stage,
            35,
            format!("Exported {} preferences", preferences.preferences.len()),
        )?;

        fs::create_dir_all(staging).map_err(|e| BackupError::from(e).during(stage.label()))?;

        // Photo archive
        let photo_manifest = if include_photos {
            let stage = BackupStage::ArchivingPhotos;
            report(sender, stage, 40, "Archiving photos")?;
            let outcome = self
                .photos
                .write_archive(
                    &staging.join(PHOTO_ARCHIVE_FILE),
                    include_thumbnails,
                    &mut |processed, total, name| {
                        report(
                            sender,
                            stage,
                            scale(40, 80, processed, total),
                            format!("Archived {}/{}: {}", processed, total, name),
                        )
                    },
                )
                .map_err(|e| e.during(stage.label()))?;
            report(
                sender,
                stage,
                80,
                format!("Archived {} file(s)", outcome.file_count),
            )?;
            outcome.manifest
        } else {
            PhotoManifest::default()
        };

        // Metadata and checksum
        let stage = BackupStage::ComputingChecksum;
        report(sender, stage, 85, "Computing bundle checksum")?;
        let archive_size = fs::metadata(staging.join(PHOTO_ARCHIVE_FILE))
            .map(|m| m.len())
            .unwrap_or(0);
        let content_size = serde_json::to_vec(&database)
            .and_then(|db| serde_json::to_vec(&preferences).map(|p| db.len() + p.len()))
            .map_err(|e| BackupError::from(e).during(stage.label()))?;

        let bundle = Bundle {
            metadata: BackupMetadata {
                id: *id,
                app_version: APP_VERSION.to_string(),
                schema_version: BUNDLE_SCHEMA_VERSION,
                device: self.device.device_info(),
                kind: BackupKind::Full,
                total_size_bytes: archive_size + content_size as u64,
                description,
                created_at: self.clock.now(),
                restore_hint,
                checksum: None,
            },
            database,
            preferences,
            photo_manifest,
        };
        let sum = checksum::calculate_checksum(&bundle)
            .map_err(|e| BackupError::from(e).during(stage.label()))?;
        debug!(checksum = %sum, "Bundle sealed");
        let bundle = bundle.seal(sum);
        report(sender, stage, 95, "Bundle sealed")?;

        // Persist
        let stage = BackupStage::Persisting;
        report(sender, stage, 96, "Writing backup")?;
        write_json_atomic(staging.join(BUNDLE_FILE), &bundle).map_err(|e| e.during(stage.label()))?;

        let final_dir = self.backup_dir.join(id.to_string());
        fs::rename(staging, &final_dir).map_err(|e| {
            BackupError::Io(format!(
                "Failed to move {} into place: {}",
                staging.display(),
                e
            ))
            .during(stage.label())
        })?;
        report(sender, stage, 100, format!("Backup written to {}", final_dir.display()))?;

        Ok(final_dir)
    }

    fn run_restore(
        &self,
        sender: &ProgressSender<RestoreProgress>,
        archive_dir: &Path,
        bundle_path: &Path,
        strategy: RestoreStrategy,
    ) -> BackupResult<RestoreProgress> {
        let started = Instant::now();
        info!(bundle = %bundle_path.display(), %strategy, "Starting restore");

        // Load
        let stage = RestoreStage::LoadingBundle;
        restore_report(sender, stage, 0, format!("Loading {}", bundle_path.display()))?;
        let document: Value = read_json_required(bundle_path).map_err(|e| e.during(stage.label()))?;
        let bundle: Bundle = serde_json::from_value(document.clone())
            .map_err(|e| BackupError::from(e).during(stage.label()))?;
        restore_report(sender, stage, 5, format!("Loaded backup {}", bundle.metadata.id))?;

        // Structural validation
        let stage = RestoreStage::ValidatingBundle;
        let (errors, warnings) = validate_structure(&bundle);
        for warning in &warnings {
            warn!(warning = %warning, "Bundle warning");
        }
        if !errors.is_empty() {
            return Err(BackupError::Validation(errors.join("; ")).during(stage.label()));
        }
        restore_report(sender, stage, 10, "Bundle structure valid")?;

        // Checksum
        let stage = RestoreStage::VerifyingChecksum;
        checksum::verify_document(&document).map_err(|e| e.during(stage.label()))?;
        restore_report(sender, stage, 20, "Checksum verified")?;

        // Tables
        let stage = RestoreStage::ImportingDatabase;
        restore_report(
            sender,
            stage,
            21,
            format!(
                "Importing {} records ({})",
                bundle.database.total_records(),
                strategy
            ),
        )?;
        let imported = self
            .records
            .import_all_tables(&bundle.database, strategy)
            .map_err(|e| e.during(stage.label()))?;
        restore_report(
            sender,
            stage,
            60,
            format!("Imported {} records", imported.records_written),
        )?;

        // Photos
        let stage = RestoreStage::ExtractingPhotos;
        let photos_restored = if bundle.photo_manifest.has_photos() {
            let archive = archive_dir.join(PHOTO_ARCHIVE_FILE);
            if !archive.is_file() {
                return Err(BackupError::Io(format!(
                    "bundle declares {} photo(s) but {} is missing",
                    bundle.photo_manifest.total_photos,
                    archive.display()
                ))
                .during(stage.label()));
            }
            restore_report(sender, stage, 61, "Extracting photos")?;
            let outcome = self
                .photos
                .extract_archive(
                    &archive,
                    self.photos.photos_dir(),
                    Some(&bundle.photo_manifest),
                    &mut |processed, total, name| {
                        restore_report(
                            sender,
                            stage,
                            scale(61, 90, processed, total),
                            format!("Extracted {}/{}: {}", processed, total, name),
                        )
                    },
                )
                .map_err(|e| e.during(stage.label()))?;
            outcome.file_count
        } else {
            debug!("Bundle declares no photos");
            0
        };
        restore_report(sender, stage, 90, format!("Restored {} photo file(s)", photos_restored))?;

        // Preferences, best-effort
        let stage = RestoreStage::ImportingPreferences;
        restore_report(sender, stage, 91, "Importing preferences")?;
        let preferences_restored = match self.preferences.import_preferences(&bundle.preferences) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Preference import failed, continuing without preferences");
                false
            }
        };
        restore_report(sender, stage, 100, "Restore finished")?;

        let duration = started.elapsed();
        info!(
            backup_id = %bundle.metadata.id,
            records = imported.records_written,
            photos = photos_restored,
            preferences_restored,
            "Restore complete"
        );

        Ok(RestoreProgress::Completed {
            backup_id: bundle.metadata.id,
            records_restored: imported.records_written,
            photos_restored,
            preferences_restored,
            duration,
        })
    }

    /// List all backups in the catalog, newest first
    pub fn list_available_backups(&self) -> BackupResult<Vec<BackupInfo>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.backup_dir).map_err(|e| {
            BackupError::Io(format!("Failed to read backup directory: {}", e))
        })? {
            let entry = entry
                .map_err(|e| BackupError::Io(format!("Failed to read directory entry: {}", e)))?;

            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !path.is_dir() {
                continue;
            }

            match self.read_backup_info(&path) {
                Ok(info) => backups.push(info),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable backup"),
            }
        }

        // Sort by date, newest first
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(backups)
    }

    fn read_backup_info(&self, dir: &Path) -> BackupResult<BackupInfo> {
        let bundle_path = dir.join(BUNDLE_FILE);
        let header: BundleHeader = read_json_required(&bundle_path)?;

        Ok(BackupInfo {
            id: header.metadata.id,
            path: dir.to_path_buf(),
            bundle_path,
            created_at: header.metadata.created_at,
            size_bytes: dir_size(dir)?,
            description: header.metadata.description,
            photo_count: header.photo_manifest.total_photos,
            app_version: header.metadata.app_version,
            restore_hint: header.metadata.restore_hint,
        })
    }

    /// Resolve `latest`, a full id, an id prefix or a path to a backup
    pub fn find_backup(&self, reference: &str) -> BackupResult<BackupInfo> {
        let backups = self.list_available_backups()?;

        if reference.eq_ignore_ascii_case("latest") {
            return backups
                .into_iter()
                .next()
                .ok_or_else(|| BackupError::backup_not_found("latest"));
        }

        let path = PathBuf::from(reference);
        if path.is_dir() && path.join(BUNDLE_FILE).is_file() {
            return self.read_backup_info(&path);
        }
        if path.is_file() {
            if let Some(dir) = path.parent() {
                return self.read_backup_info(dir);
            }
        }

        let prefix = reference.to_ascii_lowercase();
        let mut matches: Vec<BackupInfo> = backups
            .into_iter()
            .filter(|b| b.id.to_string().starts_with(&prefix))
            .collect();

        match matches.len() {
            0 => Err(BackupError::backup_not_found(reference)),
            1 => Ok(matches.remove(0)),
            n => Err(BackupError::Validation(format!(
                "'{}' matches {} backups, use a longer id",
                reference, n
            ))),
        }
    }

    /// Delete a backup from the catalog
    pub fn delete_backup(&self, id: &BackupId) -> BackupResult<()> {
        let dir = self.backup_dir.join(id.to_string());
        if !dir.is_dir() {
            return Err(BackupError::backup_not_found(id.to_string()));
        }
        fs::remove_dir_all(&dir)
            .map_err(|e| BackupError::Io(format!("Failed to delete backup {}: {}", id, e)))?;
        info!(backup_id = %id, "Backup deleted");
        Ok(())
    }

    /// Check a backup without restoring it
    ///
    /// `path` is a backup directory or a bundle document. Fails only when the
    /// document can't be read; problems with its content land in the report.
    pub fn validate_backup(&self, path: &Path) -> BackupResult<BackupValidation> {
        let bundle_path = if path.is_dir() {
            path.join(BUNDLE_FILE)
        } else {
            path.to_path_buf()
        };
        let archive_dir = bundle_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let document: Value = read_json_required(&bundle_path)?;

        let mut report = BackupValidation {
            bundle_path,
            ..BackupValidation::default()
        };

        let bundle: Bundle = match serde_json::from_value(document.clone()) {
            Ok(bundle) => bundle,
            Err(e) => {
                report.errors.push(format!("Not a backup bundle: {}", e));
                return Ok(report);
            }
        };

        report.backup_id = Some(bundle.metadata.id);
        report.created_at = Some(bundle.metadata.created_at);
        report.schema_version = Some(bundle.metadata.schema_version);
        report.record_count = bundle.database.total_records();
        report.photo_count = bundle.photo_manifest.total_photos;

        let (errors, warnings) = validate_structure(&bundle);
        report.errors.extend(errors);
        report.warnings.extend(warnings);

        match checksum::verify_document(&document) {
            Ok(()) => report.checksum_valid = true,
            Err(e) => report.errors.push(e.to_string()),
        }

        let archive = archive_dir.join(PHOTO_ARCHIVE_FILE);
        report.photo_archive_present = archive.is_file();
        if bundle.photo_manifest.has_photos() {
            if report.photo_archive_present {
                check_photo_archive(&archive, &bundle.photo_manifest, &mut report);
            } else {
                report.errors.push(format!(
                    "Bundle declares {} photo(s) but {} is missing",
                    bundle.photo_manifest.total_photos, PHOTO_ARCHIVE_FILE
                ));
            }
        }

        Ok(report)
    }

    /// Rough size of a new backup in bytes
    pub fn get_estimated_backup_size(&self, include_photos: bool) -> BackupResult<u64> {
        let records = self.records.estimated_record_count()?;
        let photos = if include_photos {
            self.photos.generate_photo_manifest()?.total_size_bytes
        } else {
            0
        };
        Ok(records * BYTES_PER_RECORD + photos + PREFERENCE_ALLOWANCE_BYTES)
    }
}

fn report(
    sender: &ProgressSender<BackupProgress>,
    stage: BackupStage,
    percent: u8,
    message: impl Into<String>,
) -> BackupResult<()> {
    sender.emit(BackupProgress::Progress {
        stage,
        percent,
        message: message.into(),
    })
}

fn restore_report(
    sender: &ProgressSender<RestoreProgress>,
    stage: RestoreStage,
    percent: u8,
    message: impl Into<String>,
) -> BackupResult<()> {
    sender.emit(RestoreProgress::Progress {
        stage,
        percent,
        message: message.into(),
    })
}

/// Map `processed / total` onto `from..=to`
fn scale(from: u8, to: u8, processed: usize, total: usize) -> u8 {
    if total == 0 {
        return to;
    }
    let span = usize::from(to - from);
    from + (span * processed.min(total) / total) as u8
}

/// Structural problems of a bundle: (errors, warnings)
fn validate_structure(bundle: &Bundle) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let metadata = &bundle.metadata;

    if metadata.schema_version == 0 {
        errors.push("Schema version 0 is not valid".to_string());
    } else if metadata.schema_version > BUNDLE_SCHEMA_VERSION {
        errors.push(format!(
            "Schema version {} is newer than supported version {}",
            metadata.schema_version, BUNDLE_SCHEMA_VERSION
        ));
    }
    if metadata.checksum.is_none() {
        errors.push("Bundle is not sealed with a checksum".to_string());
    }
    if metadata.app_version.is_empty() {
        warnings.push("Bundle does not record the producing app version".to_string());
    }

    let manifest = &bundle.photo_manifest;
    if manifest.total_photos != manifest.photos.len() {
        errors.push(format!(
            "Photo manifest declares {} photos but lists {}",
            manifest.total_photos,
            manifest.photos.len()
        ));
    }
    let listed_size: u64 = manifest.photos.iter().map(|p| p.size_bytes).sum();
    if listed_size != manifest.total_size_bytes {
        warnings.push(format!(
            "Photo manifest totals {} bytes but its entries sum to {}",
            manifest.total_size_bytes, listed_size
        ));
    }

    let mut names = HashSet::new();
    for photo in &manifest.photos {
        if !names.insert(photo.file_name.as_str()) {
            errors.push(format!("Photo {} is listed twice", photo.file_name));
        }
    }

    let items: HashSet<_> = bundle.database.check_items.iter().map(|i| i.id).collect();
    let orphaned = manifest
        .photos
        .iter()
        .filter(|p| !items.contains(&p.check_item_id))
        .count();
    if orphaned > 0 {
        warnings.push(format!(
            "{} archived photo(s) belong to check items missing from the database",
            orphaned
        ));
    }

    let integrity = check_snapshot_integrity(&bundle.database);
    errors.extend(integrity.errors);
    warnings.extend(integrity.warnings);

    (errors, warnings)
}

/// Cross-check the photo archive's own manifest against the bundle's
fn check_photo_archive(archive: &Path, manifest: &PhotoManifest, report: &mut BackupValidation) {
    let archived = ArchiveReader::open(archive, 64 * 1024).and_then(|mut reader| {
        let files = reader.count_files()?;
        Ok((files, reader.read_manifest()?))
    });

    let (files, archive_manifest) = match archived {
        Ok(result) => result,
        Err(e) => {
            report.errors.push(format!("Photo archive unreadable: {}", e));
            return;
        }
    };

    let Some(archive_manifest) = archive_manifest else {
        report
            .warnings
            .push("Photo archive has no manifest".to_string());
        return;
    };

    let thumbnail_prefix = format!("{}/", THUMBNAIL_DIR);
    let photo_entries = archive_manifest
        .entries
        .iter()
        .filter(|e| !e.name.starts_with(&thumbnail_prefix))
        .count();
    if photo_entries != manifest.total_photos {
        report.warnings.push(format!(
            "Photo archive holds {} photo(s), bundle declares {}",
            photo_entries, manifest.total_photos
        ));
    }
    if files != archive_manifest.entries.len() {
        report.warnings.push(format!(
            "Photo archive holds {} file(s) but its manifest lists {}",
            files,
            archive_manifest.entries.len()
        ));
    }

    for photo in &manifest.photos {
        match archive_manifest.hash_of(&photo.file_name) {
            Some(hash) if hash == photo.hash => {}
            Some(_) => report
                .errors
                .push(format!("{}: archived content differs from the bundle", photo.file_name)),
            None => report
                .errors
                .push(format!("{}: missing from the photo archive", photo.file_name)),
        }
    }
}
