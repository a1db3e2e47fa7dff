//! Byte storage for uploaded datasets and rendered charts.
//!
//! Objects are addressed by `(bucket, key)`. `put` returns the public URL of
//! the stored object.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use ath_protocol::object_url;
use tracing::debug;

use crate::error::BlobError;

pub trait BlobStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError>;

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<String, BlobError>;
}

/// Reject keys that could escape the bucket directory.
fn validate_key(key: &str) -> Result<(), BlobError> {
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if key.is_empty() || escapes {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Buckets are directories under `root`; keys may contain `/`.
pub struct FsBlobStore {
    root: PathBuf,
    external_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, external_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            external_base_url: external_base_url.into(),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(bucket)?;
        validate_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                BlobError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                BlobError::Io { path, source }
            }
        })
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<String, BlobError> {
        let path = self.object_path(bucket, key)?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| BlobError::Io { path, source }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        // Write then rename so readers never see a partial object.
        let tmp = path.with_extension("partial");
        fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_err(&path))?;

        debug!(bucket, key, bytes = bytes.len(), "Stored object");
        Ok(object_url(&self.external_base_url, bucket, key))
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct MemoryBlobStore {
    external_base_url: String,
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new(external_base_url: impl Into<String>) -> Self {
        Self {
            external_base_url: external_base_url.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Keys stored in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let objects = match self.objects.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError> {
        let objects = match self.objects.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| BlobError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<String, BlobError> {
        validate_key(key)?;
        let mut objects = match self.objects.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        objects.insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        Ok(object_url(&self.external_base_url, bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fs_store_roundtrip_with_nested_key() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "http://localhost:9000");

        let url = store.put("plots", "abc123/chart.png", b"png").unwrap();
        assert_eq!(url, "http://localhost:9000/plots/abc123/chart.png");
        assert_eq!(store.get("plots", "abc123/chart.png").unwrap(), b"png");
        assert!(tmp.path().join("plots/abc123/chart.png").exists());
        assert!(!tmp.path().join("plots/abc123/chart.partial").exists());
    }

    #[test]
    fn fs_store_missing_object() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "http://localhost:9000");
        assert!(matches!(
            store.get("csvs", "nope"),
            Err(BlobError::NotFound { .. })
        ));
    }

    #[test]
    fn keys_cannot_escape_bucket() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "http://localhost:9000");
        for key in ["../secret", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(store.put("plots", key, b"x"), Err(BlobError::InvalidKey(_))),
                "{key}"
            );
        }
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryBlobStore::new("http://minio:9000/");
        let url = store.put("csvs", "abc", b"team").unwrap();
        assert_eq!(url, "http://minio:9000/csvs/abc");
        assert_eq!(store.get("csvs", "abc").unwrap(), b"team");
        assert_eq!(store.keys("csvs"), vec!["abc".to_string()]);
        assert!(store.keys("plots").is_empty());
    }
}
