//! Generic table repository for JSON storage
//!
//! Each table is one JSON file holding `{"records": [...]}`. Records are kept
//! in memory keyed by primary key, ordered so that exports are stable.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BackupError;
use crate::models::Record;

use super::file_io::{read_json, write_json_atomic};

/// On-disk layout of a table file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "R: DeserializeOwned"))]
struct TableData<R> {
    #[serde(default = "Vec::new")]
    records: Vec<R>,
}

impl<R> Default for TableData<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

/// Repository for one table
pub struct TableRepository<R> {
    path: PathBuf,
    data: RwLock<BTreeMap<Uuid, R>>,
}

impl<R> TableRepository<R>
where
    R: Record + Clone + Serialize + DeserializeOwned,
{
    /// Create a new repository backed by `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Table name
    pub fn table(&self) -> &'static str {
        R::TABLE
    }

    /// Load records from disk
    pub fn load(&self) -> Result<(), BackupError> {
        let file_data: TableData<R> = read_json(&self.path)?;

        let mut data = self.write_lock()?;
        data.clear();
        for record in file_data.records {
            data.insert(record.key(), record);
        }

        Ok(())
    }

    /// Save records to disk
    pub fn save(&self) -> Result<(), BackupError> {
        let data = self.read_lock()?;

        let file_data = TableData {
            records: data.values().cloned().collect(),
        };

        write_json_atomic(&self.path, &file_data)
    }

    /// Get a record by primary key
    pub fn get(&self, key: Uuid) -> Result<Option<R>, BackupError> {
        Ok(self.read_lock()?.get(&key).cloned())
    }

    /// Get all records, ordered by primary key
    pub fn get_all(&self) -> Result<Vec<R>, BackupError> {
        Ok(self.read_lock()?.values().cloned().collect())
    }

    /// Check if a record exists
    pub fn contains(&self, key: Uuid) -> Result<bool, BackupError> {
        Ok(self.read_lock()?.contains_key(&key))
    }

    /// Insert or update a record
    pub fn upsert(&self, record: R) -> Result<(), BackupError> {
        self.write_lock()?.insert(record.key(), record);
        Ok(())
    }

    /// Insert or update many records, returning how many were written
    pub fn upsert_all(&self, records: &[R]) -> Result<usize, BackupError> {
        let mut data = self.write_lock()?;
        for record in records {
            data.insert(record.key(), record.clone());
        }
        Ok(records.len())
    }

    /// Delete a record
    pub fn delete(&self, key: Uuid) -> Result<bool, BackupError> {
        Ok(self.write_lock()?.remove(&key).is_some())
    }

    /// Delete every record, returning how many were removed
    pub fn clear(&self) -> Result<usize, BackupError> {
        let mut data = self.write_lock()?;
        let removed = data.len();
        data.clear();
        Ok(removed)
    }

    /// Number of records
    pub fn len(&self) -> Result<usize, BackupError> {
        Ok(self.read_lock()?.len())
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> Result<bool, BackupError> {
        Ok(self.len()? == 0)
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<Uuid, R>>, BackupError> {
        self.data.read().map_err(|e| {
            BackupError::Storage(format!("Failed to acquire read lock on {}: {}", R::TABLE, e))
        })
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<Uuid, R>>, BackupError> {
        self.data.write().map_err(|e| {
            BackupError::Storage(format!("Failed to acquire write lock on {}: {}", R::TABLE, e))
        })
    }
}
