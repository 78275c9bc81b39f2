//! In-process object store

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{validate_bucket, validate_key, ObjectStore};
use crate::error::StorageError;

type Objects = BTreeMap<(String, String), Vec<u8>>;

/// Object store holding every object in memory. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<Objects>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Objects> {
        // A poisoned map is still a consistent map: every mutation is a single insert.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Raw bytes stored under `bucket/key`.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Every `(bucket, key)` pair currently stored, in sorted order.
    pub fn keys(&self) -> Vec<(String, String)> {
        self.lock().keys().cloned().collect()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, local: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        let bytes = fs::read(local).map_err(|e| StorageError::LocalFile {
            path: local.to_path_buf(),
            source: e,
        })?;
        self.lock()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str, local: &Path) -> Result<(), StorageError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        let bytes = self.object(bucket, key).ok_or_else(|| StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::LocalFile {
                path: local.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(local, bytes).map_err(|e| StorageError::LocalFile {
            path: local.to_path_buf(),
            source: e,
        })
    }

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(self
            .lock()
            .contains_key(&(bucket.to_string(), key.to_string())))
    }
}
