//! Filesystem-backed object store
//!
//! Buckets are directories under a root and keys are relative paths inside
//! them. Writes land in a temporary sibling file first and are renamed into
//! place, so a re-put replaces the previous object in one step.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{validate_bucket, validate_key, ObjectStore};
use crate::error::StorageError;

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(key
            .split('/')
            .fold(self.root.join(bucket), |path, segment| path.join(segment)))
    }
}

/// Copy `from` into `to` through a temporary sibling file and rename.
fn replace_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = to
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("object");
    let tmp = to.with_file_name(format!(".{}.partial", file_name));
    fs::copy(from, &tmp)?;
    fs::rename(&tmp, to)
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, local: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let target = self.object_path(bucket, key)?;
        if !local.is_file() {
            return Err(StorageError::LocalFile {
                path: local.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        replace_file(local, &target).map_err(|e| StorageError::from_io(bucket, key, e))?;
        debug!(bucket, key, local = %local.display(), "object stored");
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str, local: &Path) -> Result<(), StorageError> {
        let source = self.object_path(bucket, key)?;
        if !source.is_file() {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        replace_file(&source, local).map_err(|e| StorageError::LocalFile {
            path: local.to_path_buf(),
            source: e,
        })?;
        debug!(bucket, key, local = %local.display(), "object fetched");
        Ok(())
    }

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self.object_path(bucket, key)?.is_file())
    }
}
