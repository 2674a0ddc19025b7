//! Photo archiver
//!
//! Streams the photo assets referenced by the photo table into a zip archive,
//! hashing every file as it is written, and extracts such archives back onto
//! disk. Individual unusable photos (missing, empty, oversized) are skipped
//! and logged; they never fail a run.
//!
//! # Layout on disk
//!
//! - photos: `<photos_dir>/<file_name>`
//! - thumbnails: `<photos_dir>/thumbnails/thumb_<file_name>`
//!
//! The archive mirrors that layout relative to `<photos_dir>`, so extracting
//! into the photo directory puts every file back where it came from.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::archive::{
    thumbnail_entry_name, thumbnail_file_name, ArchiveManifest, ArchiveReader, ArchiveWriter,
    EntryOutcome, THUMBNAIL_DIR,
};
use super::hasher::{hash_file, ContentDigest};
use super::progress::{ArchiveProgress, ExtractProgress, ProgressStream};
use crate::config::settings::BackupSettings;
use crate::error::{BackupError, BackupResult};
use crate::models::{PhotoAssetRecord, PhotoManifest, PhotoRecord};
use crate::storage::file_io::non_empty_file_len;

/// Share of manifest entries that must validate cleanly before the report
/// carries an extra warning
const MIN_CLEAN_RATIO: f64 = 0.9;

/// Source of the photo records to archive
pub trait PhotoIndex: Send + Sync {
    /// Every known photo record
    fn photo_records(&self) -> BackupResult<Vec<PhotoRecord>>;
}

/// Size caps and I/O chunk size for archiving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoArchiveLimits {
    pub max_file_bytes: u64,
    pub max_archive_bytes: u64,
    pub chunk_size: usize,
}

impl From<&BackupSettings> for PhotoArchiveLimits {
    fn from(settings: &BackupSettings) -> Self {
        Self {
            max_file_bytes: settings.max_photo_bytes,
            max_archive_bytes: settings.max_archive_bytes,
            chunk_size: settings.buffer_size,
        }
    }
}

impl Default for PhotoArchiveLimits {
    fn default() -> Self {
        Self::from(&BackupSettings::default())
    }
}

/// Result of writing a photo archive
#[derive(Debug, Clone)]
pub struct PhotoArchiveOutcome {
    pub path: PathBuf,
    /// Archive entries written, photos and thumbnails alike
    pub file_count: usize,
    /// Uncompressed bytes archived
    pub total_size_bytes: u64,
    /// Manifest of the archived photos
    pub manifest: PhotoManifest,
    /// Human-readable reasons for every skipped file
    pub skipped: Vec<String>,
    /// The archive size cap stopped the run early
    pub truncated: bool,
}

/// Result of extracting a photo archive
#[derive(Debug, Clone)]
pub struct PhotoExtractOutcome {
    pub output_dir: PathBuf,
    pub file_count: usize,
    pub total_size_bytes: u64,
    /// Manifest found in the archive, if any
    pub manifest: Option<ArchiveManifest>,
}

/// Aggregated result of checking photos on disk against a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoIntegrityReport {
    pub checked: usize,
    pub valid: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl PhotoIntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A file selected for archiving
struct Candidate {
    entry_name: String,
    source: PathBuf,
    size: u64,
    /// Index of the owning record
    record: usize,
    is_thumbnail: bool,
}

/// Archives and restores photo assets
#[derive(Clone)]
pub struct PhotoArchiver {
    index: Arc<dyn PhotoIndex>,
    photos_dir: PathBuf,
    limits: PhotoArchiveLimits,
}

impl PhotoArchiver {
    pub fn new(index: Arc<dyn PhotoIndex>, photos_dir: PathBuf, limits: PhotoArchiveLimits) -> Self {
        Self {
            index,
            photos_dir,
            limits,
        }
    }

    /// Directory holding the photo files
    pub fn photos_dir(&self) -> &Path {
        &self.photos_dir
    }

    /// Directory holding the thumbnails
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.photos_dir.join(THUMBNAIL_DIR)
    }

    fn photo_path(&self, file_name: &str) -> PathBuf {
        self.photos_dir.join(file_name)
    }

    fn thumbnail_path(&self, file_name: &str) -> PathBuf {
        self.thumbnails_dir().join(thumbnail_file_name(file_name))
    }

    /// Write a photo archive, reporting each processed file
    ///
    /// Streams progress as [`ArchiveProgress`] events. Must be called from
    /// within a tokio runtime.
    pub fn create_photo_archive(
        &self,
        output_path: PathBuf,
        include_thumbnails: bool,
    ) -> ProgressStream<ArchiveProgress> {
        let archiver = self.clone();
        ProgressStream::spawn(move |sender| {
            let outcome =
                archiver.write_archive(&output_path, include_thumbnails, &mut |processed, total, name| {
                    sender.emit(ArchiveProgress::Progress {
                        processed,
                        total,
                        current_file: name.to_string(),
                        fraction: fraction(processed, total),
                    })
                })?;
            Ok(ArchiveProgress::Completed {
                path: outcome.path,
                file_count: outcome.file_count,
                total_size_bytes: outcome.total_size_bytes,
            })
        })
    }

    /// Extract a photo archive, reporting each extracted file
    ///
    /// Must be called from within a tokio runtime.
    pub fn extract_photo_archive(
        &self,
        archive_path: PathBuf,
        output_dir: PathBuf,
    ) -> ProgressStream<ExtractProgress> {
        let archiver = self.clone();
        ProgressStream::spawn(move |sender| {
            let outcome =
                archiver.extract_archive(&archive_path, &output_dir, None, &mut |processed, total, name| {
                    sender.emit(ExtractProgress::Progress {
                        processed,
                        total,
                        current_file: name.to_string(),
                        fraction: fraction(processed, total),
                    })
                })?;
            Ok(ExtractProgress::Completed {
                output_dir: outcome.output_dir,
                file_count: outcome.file_count,
                total_size_bytes: outcome.total_size_bytes,
            })
        })
    }

    /// Select the files to archive, skipping what can't be archived
    fn collect_candidates(
        &self,
        records: &[PhotoRecord],
        include_thumbnails: bool,
        skipped: &mut Vec<String>,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            if !is_plain_file_name(&record.file_name) {
                skip(skipped, format!("{:?}: not a plain file name", record.file_name));
                continue;
            }

            let path = self.photo_path(&record.file_name);
            let Some(size) = non_empty_file_len(&path) else {
                skip(skipped, format!("{}: missing or empty", record.file_name));
                continue;
            };
            candidates.push(Candidate {
                entry_name: record.file_name.clone(),
                source: path,
                size,
                record: idx,
                is_thumbnail: false,
            });

            if include_thumbnails {
                let thumb = self.thumbnail_path(&record.file_name);
                match non_empty_file_len(&thumb) {
                    Some(size) => candidates.push(Candidate {
                        entry_name: thumbnail_entry_name(&record.file_name),
                        source: thumb,
                        size,
                        record: idx,
                        is_thumbnail: true,
                    }),
                    None => debug!(file = %record.file_name, "No thumbnail to archive"),
                }
            }
        }

        candidates
    }

    /// Write a photo archive synchronously
    ///
    /// `on_file` is called once per processed file with
    /// `(processed, total, file name)`; an error from it aborts the run.
    pub fn write_archive(
        &self,
        output_path: &Path,
        include_thumbnails: bool,
        on_file: &mut dyn FnMut(usize, usize, &str) -> BackupResult<()>,
    ) -> BackupResult<PhotoArchiveOutcome> {
        let records = self.index.photo_records()?;
        let mut skipped = Vec::new();
        let candidates = self.collect_candidates(&records, include_thumbnails, &mut skipped);
        let total = candidates.len();

        info!(
            photos = records.len(),
            files = total,
            path = %output_path.display(),
            "Creating photo archive"
        );

        let mut writer = ArchiveWriter::create(output_path, self.limits.chunk_size)?;
        let mut assets: Vec<PhotoAssetRecord> = Vec::new();
        let mut asset_for_record: HashMap<usize, usize> = HashMap::new();
        let mut truncated = false;

        for (position, candidate) in candidates.iter().enumerate() {
            let record = &records[candidate.record];

            if candidate.size > self.limits.max_file_bytes {
                skip(
                    &mut skipped,
                    format!(
                        "{}: {} bytes exceeds the {} byte limit",
                        candidate.entry_name, candidate.size, self.limits.max_file_bytes
                    ),
                );
            } else if candidate.is_thumbnail && !asset_for_record.contains_key(&candidate.record) {
                skip(
                    &mut skipped,
                    format!("{}: photo was not archived", candidate.entry_name),
                );
            } else if writer.bytes_written() + candidate.size > self.limits.max_archive_bytes {
                warn!(
                    limit = self.limits.max_archive_bytes,
                    archived = writer.entry_count(),
                    "Archive size limit reached, stopping early"
                );
                truncated = true;
                break;
            } else {
                match File::open(&candidate.source) {
                    Ok(file) => match writer.add_entry(&candidate.entry_name, BufReader::new(file)) {
                        Ok(digest) => {
                            if candidate.is_thumbnail {
                                if let Some(&asset) = asset_for_record.get(&candidate.record) {
                                    assets[asset].has_thumbnail = true;
                                }
                            } else {
                                asset_for_record.insert(candidate.record, assets.len());
                                assets.push(PhotoAssetRecord {
                                    check_item_id: record.check_item_id,
                                    file_name: record.file_name.clone(),
                                    size_bytes: digest.bytes,
                                    hash: digest.hash,
                                    has_thumbnail: false,
                                });
                            }
                        }
                        // Unreadable partway through; the entry was dropped
                        Err(BackupError::PartialAsset(reason)) => skip(&mut skipped, reason),
                        Err(e) => return Err(e),
                    },
                    // The file vanished between selection and archiving
                    Err(e) => skip(
                        &mut skipped,
                        format!("{}: {}", candidate.entry_name, e),
                    ),
                }
            }

            on_file(position + 1, total, &candidate.entry_name)?;
        }

        let file_count = writer.entry_count();
        let total_size_bytes = writer.bytes_written();
        writer.finish(Utc::now())?;

        info!(
            file_count,
            total_size_bytes,
            skipped = skipped.len(),
            truncated,
            "Photo archive written"
        );

        Ok(PhotoArchiveOutcome {
            path: output_path.to_path_buf(),
            file_count,
            total_size_bytes,
            manifest: PhotoManifest::from_assets(assets, include_thumbnails),
            skipped,
            truncated,
        })
    }

    /// Extract a photo archive synchronously
    ///
    /// The first pass lists the file entries and reads the manifest; the
    /// second streams every file to disk. Each file is checked against the
    /// archive's own manifest and, when given, against `declared`, the photo
    /// manifest of the bundle the archive belongs to. A file that fails
    /// either check never replaces what is on disk. Every photo `declared`
    /// lists must be present in the archive.
    pub fn extract_archive(
        &self,
        archive_path: &Path,
        output_dir: &Path,
        declared: Option<&PhotoManifest>,
        on_file: &mut dyn FnMut(usize, usize, &str) -> BackupResult<()>,
    ) -> BackupResult<PhotoExtractOutcome> {
        let mut reader = ArchiveReader::open(archive_path, self.limits.chunk_size)?;
        let names = reader.file_names()?;
        let total = names.len();
        let manifest = reader.read_manifest()?;
        if manifest.is_none() {
            warn!(path = %archive_path.display(), "Photo archive has no manifest");
        }

        let declared_hashes: HashMap<&str, &str> = declared
            .map(|m| {
                m.photos
                    .iter()
                    .map(|p| (p.file_name.as_str(), p.hash.as_str()))
                    .collect()
            })
            .unwrap_or_default();
        let present: HashSet<&str> = names.iter().map(String::as_str).collect();
        if let Some(missing) = declared_hashes.keys().find(|name| !present.contains(**name)) {
            return Err(BackupError::Integrity(format!(
                "{} is missing from the photo archive",
                missing
            )));
        }

        std::fs::create_dir_all(output_dir)?;

        let mut verify = |name: &str, digest: &ContentDigest| -> BackupResult<()> {
            if let Some(expected) = declared_hashes.get(name) {
                if *expected != digest.hash {
                    return Err(BackupError::Integrity(format!(
                        "{} does not match the backup's photo manifest",
                        name
                    )));
                }
            }
            match manifest.as_ref().map(|m| m.hash_of(name)) {
                Some(Some(expected)) if expected != digest.hash => Err(BackupError::Integrity(
                    format!("{} does not match its manifest hash", name),
                )),
                Some(None) => {
                    warn!(entry = %name, "Archive entry missing from manifest");
                    Ok(())
                }
                _ => Ok(()),
            }
        };

        let mut processed = 0;
        let mut file_count = 0;
        let mut total_size_bytes = 0;
        let mut restored: HashSet<String> = HashSet::new();

        for index in 0..reader.len() {
            let name = match reader.extract_entry(index, output_dir, &mut verify)? {
                EntryOutcome::NotAFile => continue,
                EntryOutcome::Unsafe(name) => {
                    warn!(entry = %name, "Skipping archive entry outside the output directory");
                    name
                }
                EntryOutcome::Extracted(entry) => {
                    file_count += 1;
                    total_size_bytes += entry.digest.bytes;
                    restored.insert(entry.name.clone());
                    entry.name
                }
            };

            processed += 1;
            on_file(processed, total, &name)?;
        }

        if let Some(missing) = declared_hashes.keys().find(|name| !restored.contains(**name)) {
            return Err(BackupError::Integrity(format!(
                "{} could not be restored from the photo archive",
                missing
            )));
        }

        info!(
            file_count,
            total_size_bytes,
            output = %output_dir.display(),
            "Photo archive extracted"
        );

        Ok(PhotoExtractOutcome {
            output_dir: output_dir.to_path_buf(),
            file_count,
            total_size_bytes,
            manifest,
        })
    }

    /// Describe the photos currently on disk
    pub fn generate_photo_manifest(&self) -> BackupResult<PhotoManifest> {
        let mut assets = Vec::new();

        for record in self.index.photo_records()? {
            if !is_plain_file_name(&record.file_name) {
                continue;
            }
            let path = self.photo_path(&record.file_name);
            if non_empty_file_len(&path).is_none() {
                continue;
            }

            let digest = hash_file(&path, self.limits.chunk_size)?;
            assets.push(PhotoAssetRecord {
                check_item_id: record.check_item_id,
                has_thumbnail: non_empty_file_len(self.thumbnail_path(&record.file_name)).is_some(),
                file_name: record.file_name,
                size_bytes: digest.bytes,
                hash: digest.hash,
            });
        }

        Ok(PhotoManifest::from_assets(assets, false))
    }

    /// Check the photos on disk against a manifest
    pub fn validate_photo_integrity(&self, manifest: &PhotoManifest) -> PhotoIntegrityReport {
        let mut report = PhotoIntegrityReport::default();

        for asset in &manifest.photos {
            report.checked += 1;
            let path = self.photo_path(&asset.file_name);

            let Some(size) = non_empty_file_len(&path) else {
                report
                    .errors
                    .push(format!("{}: file is missing or empty", asset.file_name));
                continue;
            };

            let mut clean = true;
            if size != asset.size_bytes {
                report.warnings.push(format!(
                    "{}: size is {} bytes, manifest says {}",
                    asset.file_name, size, asset.size_bytes
                ));
                clean = false;
            }

            match hash_file(&path, self.limits.chunk_size) {
                Ok(digest) if digest.hash == asset.hash => {}
                Ok(_) => {
                    report
                        .errors
                        .push(format!("{}: content hash mismatch", asset.file_name));
                    clean = false;
                }
                Err(e) => {
                    report.errors.push(format!("{}: {}", asset.file_name, e));
                    clean = false;
                }
            }

            if clean {
                report.valid += 1;
            }
        }

        if report.checked > 0 && (report.valid as f64) < report.checked as f64 * MIN_CLEAN_RATIO {
            report.warnings.push(format!(
                "Only {} of {} photos validated cleanly",
                report.valid, report.checked
            ));
        }

        report
    }
}

fn skip(skipped: &mut Vec<String>, reason: String) {
    let error = BackupError::PartialAsset(reason);
    warn!(error = %error, "Skipping photo");
    skipped.push(error.to_string());
}

/// A bare file name that can't climb out of the photo directory
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

fn fraction(processed: usize, total: usize) -> f32 {
    if total == 0 {
        1.0
    } else {
        processed as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::MANIFEST_ENTRY;
    use crate::backup::hasher::sha256_hex;
    use crate::models::CheckItemId;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    struct FixedIndex(Vec<PhotoRecord>);

    impl PhotoIndex for FixedIndex {
        fn photo_records(&self) -> BackupResult<Vec<PhotoRecord>> {
            Ok(self.0.clone())
        }
    }

    fn setup(files: &[(&str, usize)]) -> (PhotoArchiver, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let photos_dir = temp_dir.path().join("photos");
        fs::create_dir_all(photos_dir.join(THUMBNAIL_DIR)).unwrap();

        let item = CheckItemId::new();
        let mut records = Vec::new();
        for (name, size) in files {
            // usize::MAX marks a record whose file was never written
            if *size != usize::MAX {
                let bytes: Vec<u8> = (0..*size).map(|i| (i % 256) as u8).collect();
                fs::write(photos_dir.join(name), bytes).unwrap();
            }
            records.push(PhotoRecord::new(item, *name));
        }

        let archiver = PhotoArchiver::new(
            Arc::new(FixedIndex(records)),
            photos_dir,
            PhotoArchiveLimits::default(),
        );
        (archiver, temp_dir)
    }

    fn write_thumb(archiver: &PhotoArchiver, file_name: &str, bytes: &[u8]) {
        fs::write(archiver.thumbnail_path(file_name), bytes).unwrap();
    }

    fn no_progress(_: usize, _: usize, _: &str) -> BackupResult<()> {
        Ok(())
    }

    #[test]
    fn test_missing_and_empty_files_are_skipped() {
        let (archiver, temp) = setup(&[
            ("a.jpg", 50_000),
            ("b.jpg", 50_000),
            ("empty.jpg", 0),
            ("gone.jpg", usize::MAX),
        ]);
        let output = temp.path().join("photos.zip");

        let mut events = Vec::new();
        let outcome = archiver
            .write_archive(&output, false, &mut |processed, total, name| {
                events.push((processed, total, name.to_string()));
                Ok(())
            })
            .unwrap();

        assert_eq!(outcome.file_count, 2);
        assert_eq!(outcome.total_size_bytes, 100_000);
        assert_eq!(outcome.skipped.len(), 2);
        assert!(outcome.skipped.iter().all(|r| r.starts_with("Photo skipped:")));
        assert!(!outcome.truncated);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], (2, 2, "b.jpg".to_string()));

        let names: Vec<_> = outcome.manifest.photos.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);

        let mut reader = ArchiveReader::open(&output, 1024).unwrap();
        let manifest = reader.read_manifest().unwrap().unwrap();
        assert_eq!(manifest.entries.len(), 2);
        assert!(manifest.hash_of("empty.jpg").is_none());
        assert!(manifest.hash_of("gone.jpg").is_none());
    }

    #[tokio::test]
    async fn test_create_photo_archive_stream() {
        let (archiver, temp) = setup(&[("a.jpg", 50_000), ("b.jpg", 50_000), ("zero.jpg", 0)]);
        let output = temp.path().join("photos.zip");

        let events = archiver.create_photo_archive(output.clone(), false).collect_all().await;

        let progress: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ArchiveProgress::Progress { .. }))
            .collect();
        assert_eq!(progress.len(), 2);
        match events.last().unwrap() {
            ArchiveProgress::Completed {
                path,
                file_count,
                total_size_bytes,
            } => {
                assert_eq!(path, &output);
                assert_eq!(*file_count, 2);
                assert_eq!(*total_size_bytes, 100_000);
            }
            other => panic!("unexpected terminal event {:?}", other),
        }
    }

    #[test]
    fn test_thumbnails_are_archived_when_requested() {
        let (archiver, temp) = setup(&[("a.jpg", 100), ("b.jpg", 100)]);
        write_thumb(&archiver, "a.jpg", b"thumb-a");
        let output = temp.path().join("photos.zip");

        let outcome = archiver
            .write_archive(&output, true, &mut no_progress)
            .unwrap();

        assert_eq!(outcome.file_count, 3);
        assert!(outcome.manifest.thumbnails_included);
        assert!(outcome.manifest.photos[0].has_thumbnail);
        assert!(!outcome.manifest.photos[1].has_thumbnail);

        let mut reader = ArchiveReader::open(&output, 1024).unwrap();
        let manifest = reader.read_manifest().unwrap().unwrap();
        assert_eq!(
            manifest.hash_of("thumbnails/thumb_a.jpg"),
            Some(sha256_hex(b"thumb-a").as_str())
        );
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let (mut archiver, temp) = setup(&[("big.jpg", 2_000), ("small.jpg", 100)]);
        archiver.limits.max_file_bytes = 1_000;
        let output = temp.path().join("photos.zip");

        let mut calls = 0;
        let outcome = archiver
            .write_archive(&output, false, &mut |_, _, _| {
                calls += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(outcome.file_count, 1);
        assert_eq!(outcome.manifest.photos[0].file_name, "small.jpg");
        assert_eq!(outcome.skipped.len(), 1);
        // Skipped files still count as processed
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_archive_cap_stops_early_and_finalizes() {
        let (mut archiver, temp) = setup(&[("a.jpg", 600), ("b.jpg", 600), ("c.jpg", 600)]);
        archiver.limits.max_archive_bytes = 1_000;
        let output = temp.path().join("photos.zip");

        let outcome = archiver
            .write_archive(&output, false, &mut no_progress)
            .unwrap();

        assert!(outcome.truncated);
        assert_eq!(outcome.file_count, 1);

        let mut reader = ArchiveReader::open(&output, 1024).unwrap();
        assert_eq!(reader.count_files().unwrap(), 1);
        assert!(reader.read_manifest().unwrap().is_some());
    }

    #[test]
    fn test_extract_round_trip() {
        let (archiver, temp) = setup(&[("a.jpg", 3_000), ("b.jpg", 10)]);
        write_thumb(&archiver, "b.jpg", b"tb");
        let output = temp.path().join("photos.zip");
        archiver
            .write_archive(&output, true, &mut no_progress)
            .unwrap();

        let restore_dir = temp.path().join("restored");
        let mut events = Vec::new();
        let outcome = archiver
            .extract_archive(&output, &restore_dir, None, &mut |processed, total, _| {
                events.push((processed, total));
                Ok(())
            })
            .unwrap();

        assert_eq!(outcome.file_count, 3);
        assert_eq!(outcome.total_size_bytes, 3_012);
        assert_eq!(events, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(
            fs::read(restore_dir.join("a.jpg")).unwrap(),
            fs::read(archiver.photo_path("a.jpg")).unwrap()
        );
        assert_eq!(
            fs::read(restore_dir.join("thumbnails").join("thumb_b.jpg")).unwrap(),
            b"tb"
        );
        assert!(!restore_dir.join(MANIFEST_ENTRY).exists());
    }

    #[test]
    fn test_extract_detects_tampered_entry() {
        let temp = TempDir::new().unwrap();
        let archive_path = temp.path().join("photos.zip");

        // Hand-built archive whose manifest disagrees with the entry
        let file = File::create(&archive_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("a.jpg", options).unwrap();
        zip.write_all(b"actual bytes").unwrap();
        zip.start_file(MANIFEST_ENTRY, options).unwrap();
        zip.write_all(format!("a.jpg={}\n", sha256_hex(b"other bytes")).as_bytes())
            .unwrap();
        zip.finish().unwrap();

        let (archiver, _t) = setup(&[]);
        let err = archiver
            .extract_archive(&archive_path, &temp.path().join("out"), None, &mut no_progress)
            .unwrap_err();
        assert!(matches!(err, BackupError::Integrity(_)));
    }

    /// Zip with the given entries and, optionally, a manifest text
    fn hand_built_archive(path: &Path, entries: &[(&str, &[u8])], manifest: Option<String>) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        if let Some(text) = manifest {
            zip.start_file(MANIFEST_ENTRY, options).unwrap();
            zip.write_all(text.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn declared(entries: &[(&str, &[u8])]) -> PhotoManifest {
        let item = CheckItemId::new();
        let assets = entries
            .iter()
            .map(|(name, bytes)| PhotoAssetRecord {
                check_item_id: item,
                file_name: name.to_string(),
                size_bytes: bytes.len() as u64,
                hash: sha256_hex(bytes),
                has_thumbnail: false,
            })
            .collect();
        PhotoManifest::from_assets(assets, false)
    }

    #[test]
    fn test_corrupted_entry_keeps_existing_photo() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("a.jpg"), b"GOOD ORIGINAL PHOTO").unwrap();

        let archive_path = temp.path().join("photos.zip");
        hand_built_archive(
            &archive_path,
            &[("a.jpg", &b"corrupted bytes"[..])],
            Some(format!("a.jpg={}\n", sha256_hex(b"GOOD ORIGINAL PHOTO"))),
        );

        let (archiver, _t) = setup(&[]);
        let err = archiver
            .extract_archive(&archive_path, &out, None, &mut no_progress)
            .unwrap_err();

        assert!(matches!(err, BackupError::Integrity(_)));
        assert_eq!(fs::read(out.join("a.jpg")).unwrap(), b"GOOD ORIGINAL PHOTO");
        assert!(!out.join("a.jpg.partial").exists());
    }

    #[test]
    fn test_declared_manifest_overrides_archive_contents() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("a.jpg"), b"original").unwrap();

        // No manifest inside the archive, swapped bytes
        let archive_path = temp.path().join("photos.zip");
        hand_built_archive(&archive_path, &[("a.jpg", &b"swapped"[..])], None);

        let (archiver, _t) = setup(&[]);
        let expected = declared(&[("a.jpg", &b"original"[..])]);
        let err = archiver
            .extract_archive(&archive_path, &out, Some(&expected), &mut no_progress)
            .unwrap_err();

        assert!(matches!(err, BackupError::Integrity(_)));
        assert_eq!(fs::read(out.join("a.jpg")).unwrap(), b"original");
    }

    #[test]
    fn test_declared_photo_missing_from_archive() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let archive_path = temp.path().join("photos.zip");
        hand_built_archive(&archive_path, &[("other.jpg", &b"x"[..])], None);

        let (archiver, _t) = setup(&[]);
        let expected = declared(&[("a.jpg", &b"original"[..])]);
        let err = archiver
            .extract_archive(&archive_path, &out, Some(&expected), &mut no_progress)
            .unwrap_err();

        assert!(matches!(err, BackupError::Integrity(ref m) if m.contains("a.jpg")));
        // Nothing was written before the check failed
        assert!(!out.join("other.jpg").exists());
    }

    #[test]
    fn test_declared_manifest_accepts_matching_archive() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let archive_path = temp.path().join("photos.zip");
        hand_built_archive(
            &archive_path,
            &[("a.jpg", &b"original"[..]), ("thumbnails/thumb_a.jpg", &b"t"[..])],
            None,
        );

        let (archiver, _t) = setup(&[]);
        let expected = declared(&[("a.jpg", &b"original"[..])]);
        let outcome = archiver
            .extract_archive(&archive_path, &out, Some(&expected), &mut no_progress)
            .unwrap();

        assert_eq!(outcome.file_count, 2);
        assert_eq!(fs::read(out.join("a.jpg")).unwrap(), b"original");
    }

    #[test]
    fn test_generate_manifest_reflects_disk() {
        let (archiver, _temp) = setup(&[("a.jpg", 10), ("b.jpg", 0), ("c.jpg", 20)]);
        write_thumb(&archiver, "c.jpg", b"t");

        let manifest = archiver.generate_photo_manifest().unwrap();

        assert_eq!(manifest.total_photos, 2);
        assert_eq!(manifest.total_size_bytes, 30);
        assert!(!manifest.photos[0].has_thumbnail);
        assert!(manifest.photos[1].has_thumbnail);
    }

    #[test]
    fn test_validate_photo_integrity() {
        let (archiver, _temp) = setup(&[("a.jpg", 10), ("b.jpg", 10), ("c.jpg", 10)]);
        let mut manifest = archiver.generate_photo_manifest().unwrap();

        let clean = archiver.validate_photo_integrity(&manifest);
        assert!(clean.is_valid());
        assert_eq!(clean.valid, 3);
        assert!(clean.warnings.is_empty());

        // Same length, different bytes: hash error only
        fs::write(archiver.photo_path("a.jpg"), vec![9u8; 10]).unwrap();
        // Recorded size off: size warning only
        manifest.photos[1].size_bytes = 11;
        fs::remove_file(archiver.photo_path("c.jpg")).unwrap();

        let report = archiver.validate_photo_integrity(&manifest);
        assert_eq!(report.checked, 3);
        assert_eq!(report.valid, 0);
        assert_eq!(report.errors.len(), 2);
        // Size mismatch plus the below-threshold summary
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[1].contains("0 of 3"));
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("photo.jpg"));
        assert!(!is_plain_file_name("../etc/passwd"));
        assert!(!is_plain_file_name("dir/photo.jpg"));
        assert!(!is_plain_file_name(""));
    }
}
