//! Storage module - durable object store the stages hand artifacts through

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use std::path::Path;

use crate::error::StorageError;

/// Uniform put/get of named byte blobs in a bucket/key namespace.
///
/// Both operations overwrite their target: re-putting a key replaces the
/// stored object, re-getting into a local path replaces the local file.
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `local` to `bucket/key`.
    fn put(&self, local: &Path, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Download `bucket/key` into the file at `local`.
    fn get(&self, bucket: &str, key: &str, local: &Path) -> Result<(), StorageError>;

    /// Whether `bucket/key` currently holds an object.
    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;
}

/// Reject keys that could escape their bucket.
///
/// Keys are relative, `/`-separated and contain no empty, `.` or `..` segments.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn validate_bucket(bucket: &str) -> Result<(), StorageError> {
    if bucket.trim().is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
        return Err(StorageError::InvalidKey(format!("{}/", bucket)));
    }
    Ok(())
}
