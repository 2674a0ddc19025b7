//! Bundle checksum
//!
//! A single SHA-256 over the canonical JSON form of a bundle. The canonical
//! form is the bundle as a JSON value with every object's keys sorted and
//! `metadata.checksum` removed, serialized without whitespace.

use std::io::{self, Write};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::{BackupError, BackupResult};
use crate::models::Bundle;

/// Failure while computing a checksum
#[derive(Error, Debug)]
pub enum ChecksumError {
    /// The bundle could not be turned into its canonical form
    #[error("canonical serialization failed: {0}")]
    Serialization(String),

    /// The canonical bytes could not be fed to the hasher
    #[error("hashing failed: {0}")]
    Hashing(String),
}

impl From<ChecksumError> for BackupError {
    fn from(err: ChecksumError) -> Self {
        match err {
            ChecksumError::Serialization(msg) => BackupError::Json(msg),
            ChecksumError::Hashing(msg) => BackupError::Integrity(msg),
        }
    }
}

/// `io::Write` sink that feeds a SHA-256
struct HashWriter(Sha256);

impl Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compute the checksum of a bundle, ignoring any checksum it already holds
pub fn calculate_checksum(bundle: &Bundle) -> Result<String, ChecksumError> {
    let document =
        serde_json::to_value(bundle).map_err(|e| ChecksumError::Serialization(e.to_string()))?;
    document_checksum(&document)
}

/// Compute the checksum of a bundle document as read from disk
///
/// Fields this build doesn't know about still take part.
pub fn document_checksum(document: &Value) -> Result<String, ChecksumError> {
    let mut canonical = canonicalize(document);
    strip_checksum(&mut canonical)?;

    let mut writer = HashWriter(Sha256::new());
    serde_json::to_writer(&mut writer, &canonical)
        .map_err(|e| ChecksumError::Hashing(e.to_string()))?;
    Ok(format!("{:x}", writer.0.finalize()))
}

/// Check a bundle against the checksum in its metadata
pub fn verify_integrity(bundle: &Bundle) -> BackupResult<()> {
    let stored = bundle
        .metadata
        .checksum
        .as_deref()
        .ok_or_else(|| BackupError::Integrity("bundle carries no checksum".into()))?;
    compare(stored, &calculate_checksum(bundle)?)
}

/// Check a raw bundle document against the checksum it carries
pub fn verify_document(document: &Value) -> BackupResult<()> {
    let stored = document
        .pointer("/metadata/checksum")
        .and_then(Value::as_str)
        .ok_or_else(|| BackupError::Integrity("bundle carries no checksum".into()))?;
    compare(stored, &document_checksum(document)?)
}

fn compare(stored: &str, computed: &str) -> BackupResult<()> {
    if stored.eq_ignore_ascii_case(computed) {
        Ok(())
    } else {
        Err(BackupError::Integrity(format!(
            "checksum mismatch: expected {}, computed {}",
            stored, computed
        )))
    }
}

/// Copy of `value` with every object's keys in sorted order
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn strip_checksum(document: &mut Value) -> Result<(), ChecksumError> {
    let metadata = document
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| ChecksumError::Serialization("bundle has no metadata object".into()))?;
    metadata.remove("checksum");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BackupId, BackupKind, BackupMetadata, CheckItemId, Client, DatabaseSnapshot, DeviceInfo,
        PhotoAssetRecord, PhotoManifest, PreferenceSnapshot,
    };
    use chrono::Utc;

    fn sample_bundle() -> Bundle {
        let mut database = DatabaseSnapshot::empty(Utc::now());
        database.clients.push(Client::new("ACME"));

        let mut preferences = PreferenceSnapshot::default();
        preferences
            .preferences
            .insert("theme".into(), "dark".into());

        Bundle {
            metadata: BackupMetadata {
                id: BackupId::new(),
                app_version: "0.1.0".into(),
                schema_version: 1,
                device: DeviceInfo::default(),
                kind: BackupKind::Full,
                total_size_bytes: 1234,
                description: None,
                created_at: Utc::now(),
                restore_hint: None,
                checksum: None,
            },
            database,
            preferences,
            photo_manifest: PhotoManifest::from_assets(
                vec![PhotoAssetRecord {
                    check_item_id: CheckItemId::new(),
                    file_name: "a.jpg".into(),
                    size_bytes: 10,
                    hash: "00ff".into(),
                    has_thumbnail: false,
                }],
                false,
            ),
        }
    }

    fn sealed() -> Bundle {
        let bundle = sample_bundle();
        let checksum = calculate_checksum(&bundle).unwrap();
        bundle.seal(checksum)
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        let checksum = calculate_checksum(&sample_bundle()).unwrap();
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_checksum_ignores_checksum_field() {
        let bundle = sample_bundle();
        let before = calculate_checksum(&bundle).unwrap();
        let sealed = bundle.seal("whatever".into());
        assert_eq!(calculate_checksum(&sealed).unwrap(), before);
    }

    #[test]
    fn test_unmodified_bundle_verifies() {
        let bundle = sealed();
        verify_integrity(&bundle).unwrap();
        verify_document(&serde_json::to_value(&bundle).unwrap()).unwrap();
    }

    #[test]
    fn test_unsealed_bundle_fails() {
        let err = verify_integrity(&sample_bundle()).unwrap_err();
        assert!(matches!(err, BackupError::Integrity(_)));
    }

    #[test]
    fn test_altered_photo_manifest_fails() {
        let mut bundle = sealed();
        bundle.photo_manifest.photos[0].hash = "00fe".into();
        assert!(matches!(
            verify_integrity(&bundle),
            Err(BackupError::Integrity(_))
        ));
    }

    #[test]
    fn test_altered_record_fails() {
        let mut bundle = sealed();
        bundle.database.clients[0].name = "ACME Ltd".into();
        assert!(verify_integrity(&bundle).is_err());
    }

    #[test]
    fn test_altered_metadata_fails() {
        let mut bundle = sealed();
        bundle.metadata.total_size_bytes += 1;
        assert!(verify_integrity(&bundle).is_err());
    }

    #[test]
    fn test_unknown_document_fields_are_covered() {
        let mut document = serde_json::to_value(sample_bundle()).unwrap();
        document["metadata"]["future_field"] = Value::from("x");
        let checksum = document_checksum(&document).unwrap();
        document["metadata"]["checksum"] = Value::from(checksum);
        verify_document(&document).unwrap();

        document["metadata"]["future_field"] = Value::from("y");
        assert!(verify_document(&document).is_err());
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"metadata":{"b":1,"a":2},"x":[{"d":1,"c":2}]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"x":[{"c":2,"d":1}],"metadata":{"a":2,"b":1}}"#).unwrap();
        assert_eq!(document_checksum(&a).unwrap(), document_checksum(&b).unwrap());
    }

    #[test]
    fn test_document_without_metadata_is_serialization_error() {
        let err = document_checksum(&Value::from(3)).unwrap_err();
        assert!(matches!(err, ChecksumError::Serialization(_)));
    }
}
