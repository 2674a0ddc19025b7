//! Backup engine for field-backup
//!
//! Takes full snapshots of the field-service data and restores them.
//!
//! # Architecture
//!
//! - `database`: the relational export/import contract and integrity checks
//! - `preferences`: flattens the legacy and structured preference stores
//! - `photos`: streams photo assets into a hashed zip archive and back
//! - `checksum`: a single digest over the canonical bundle document
//! - `orchestrator`: sequences the above, stages and persists the result
//!
//! # Backup Format
//!
//! Each backup is a directory named after its id holding:
//! - `backup.json`: metadata, database snapshot, preferences and photo
//!   manifest, sealed with a SHA-256 checksum
//! - `photos.zip`: photo files, optional thumbnails and a `MANIFEST.txt`
//!   listing every entry with its hash
//!
//! # Example
//!
//! ```rust,ignore
//! use field_backup::backup::{BackupOrchestrator, BackupProgress};
//! use field_backup::config::{FieldPaths, Settings};
//!
//! let paths = FieldPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let orchestrator = BackupOrchestrator::from_paths(&paths, &settings)?;
//!
//! let mut progress = orchestrator.create_full_backup(true, false, None, None);
//! while let Some(event) = progress.next_event().await {
//!     if let BackupProgress::Completed { path, .. } = event {
//!         println!("Backup written to {}", path.display());
//!     }
//! }
//! ```

pub mod archive;
pub mod checksum;
pub mod database;
pub mod hasher;
pub mod orchestrator;
pub mod photos;
pub mod preferences;
pub mod progress;

pub use checksum::ChecksumError;
pub use database::{clear_all_data, ImportSummary, IntegrityReport, RecordStore};
pub use orchestrator::{BackupInfo, BackupOrchestrator, BackupValidation, BUNDLE_FILE, PHOTO_ARCHIVE_FILE};
pub use photos::{PhotoArchiveLimits, PhotoArchiver, PhotoIndex, PhotoIntegrityReport};
pub use preferences::{
    LegacyPreferenceStore, PreferenceBackup, PreferenceImportSummary, StructuredPreferenceStore,
};
pub use progress::{
    ArchiveProgress, BackupProgress, BackupStage, ExtractProgress, Failure, ProgressStream,
    RestoreProgress, RestoreStage,
};
