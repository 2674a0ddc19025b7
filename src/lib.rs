//! field-backup - Full-snapshot backup and restore for field-service data
//!
//! This library provides the backup engine of a field-service reporting
//! application: clients, facilities, islands, checkups with their check
//! items, photos and spare parts, plus the user's preferences, captured as
//! one checksummed bundle with a sibling photo archive.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Paths, engine settings and the preference stores
//! - `error`: Custom error types
//! - `models`: Table records and the bundle documents
//! - `storage`: JSON file storage for the tables
//! - `backup`: Backup orchestration, photo archiving and checksums
//! - `device`: Device facts and clock
//! - `cli`: Command handlers for the `fieldbackup` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use field_backup::config::{FieldPaths, Settings};
//!
//! let paths = FieldPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod models;
pub mod storage;

pub use error::{BackupError, BackupResult};
