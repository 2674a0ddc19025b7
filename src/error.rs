//! Custom error types for field-backup
//!
//! This module defines the error hierarchy for the backup engine using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// Classification of an error, used by progress consumers to decide how to
/// present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structural problems in the source database or an existing backup
    Validation,
    /// Checksum mismatch or a corrupted archive entry
    Integrity,
    /// Disk full, permission denied, missing file, unreadable document
    Io,
    /// A single photo could not be archived
    PartialAsset,
    /// A failure in a subsystem whose loss does not fail the operation
    NonCritical,
    /// The progress consumer went away
    Cancelled,
}

/// The main error type for backup and restore operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for databases and bundles
    #[error("Validation error: {0}")]
    Validation(String),

    /// Checksum and content hash mismatches
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Zip container errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Preference store errors
    #[error("Preference error: {0}")]
    Preferences(String),

    /// An individual photo was skipped
    #[error("Photo skipped: {0}")]
    PartialAsset(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// A failure reported by a background run through its progress stream
    #[error("{message}")]
    Run { message: String, kind: ErrorKind },

    /// The consumer of a progress stream dropped it
    #[error("Operation cancelled")]
    Cancelled,

    /// An error raised inside a named stage of a backup or restore run
    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<BackupError>,
    },
}

impl BackupError {
    /// Create a "not found" error for backups
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Attach the name of the stage in which this error happened
    pub fn during(self, stage: &'static str) -> Self {
        match self {
            // Cancellation must stay recognisable so no terminal event is sent
            Self::Cancelled => Self::Cancelled,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::PartialAsset(_) => ErrorKind::PartialAsset,
            Self::Preferences(_) => ErrorKind::NonCritical,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Stage { source, .. } => source.kind(),
            Self::Run { kind, .. } => *kind,
            Self::Config(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Archive(_)
            | Self::Storage(_)
            | Self::NotFound { .. } => ErrorKind::Io,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The innermost error message, without stage prefixes
    pub fn root_message(&self) -> String {
        match self {
            Self::Stage { source, .. } => source.root_message(),
            other => other.to_string(),
        }
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<zip::result::ZipError> for BackupError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

/// Result type alias for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackupError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = BackupError::backup_not_found("latest");
        assert_eq!(err.to_string(), "Backup not found: latest");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_stage_wrapping_keeps_kind() {
        let err = BackupError::Integrity("checksum mismatch".into()).during("Checksum verification");
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(
            err.to_string(),
            "Checksum verification failed: Integrity error: checksum mismatch"
        );
        assert_eq!(err.root_message(), "Integrity error: checksum mismatch");
    }

    #[test]
    fn test_cancelled_is_not_wrapped() {
        let err = BackupError::Cancelled.during("Photo archiving");
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BackupError = io_err.into();
        assert!(matches!(err, BackupError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
