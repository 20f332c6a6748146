//! Object storage for templates, ledger snapshots and destination cleanup

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::StoreError;

/// Bucketed key/value object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Replace the object atomically; readers never see a partial write
    async fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Keys in `bucket` starting with `prefix`
    async fn list(&self, bucket: &str, prefix: &str) -> Result<BTreeSet<String>, StoreError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// Read an object, mapping a missing key to `None`
pub async fn get_optional(store: &dyn ObjectStore, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
    match store.get(bucket, key).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Delete every object under `prefix`; returns the number removed
pub async fn delete_prefix(store: &dyn ObjectStore, bucket: &str, prefix: &str) -> Result<usize, StoreError> {
    let keys = store.list(bucket, prefix).await?;
    for key in &keys {
        store.delete(bucket, key).await?;
    }
    info!(%bucket, %prefix, count = keys.len(), "Cleaned prefix");
    Ok(keys.len())
}

/// Non-empty and made only of normal path components
fn is_relative_key(key: &str) -> bool {
    !key.is_empty() && Path::new(key).components().all(|c| matches!(c, Component::Normal(_)))
}

/// Filesystem-backed store: one directory per bucket under `root`
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        debug!(?root, "LocalObjectStore::new: called");
        Self { root }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        if !is_relative_key(bucket) {
            return Err(StoreError::InvalidKey(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        if !is_relative_key(key) {
            return Err(StoreError::InvalidKey(format!("{}/{}", bucket, key)));
        }
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        debug!(%bucket, %key, "LocalObjectStore::get: called");
        let path = self.path(bucket, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        debug!(%bucket, %key, len = bytes.len(), "LocalObjectStore::put: called");
        let path = self.path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| StoreError::io(parent, e))?;
        }
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("object");
        let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::now_v7()));
        fs::write(&tmp, bytes).await.map_err(|e| StoreError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(path, e));
        }
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        debug!(%bucket, %prefix, "LocalObjectStore::list: called");
        let bucket_dir = self.bucket_dir(bucket)?;
        if !bucket_dir.exists() {
            return Ok(BTreeSet::new());
        }
        let prefix = prefix.to_string();
        let walk_root = bucket_dir.clone();
        tokio::task::spawn_blocking(move || {
            let mut keys = BTreeSet::new();
            for entry in WalkDir::new(&walk_root) {
                let entry = entry.map_err(|e| {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| walk_root.clone());
                    StoreError::io(path, std::io::Error::other(e))
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&walk_root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .collect::<Vec<_>>()
                    .join("/");
                let is_temp = relative
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.') && n.ends_with(".tmp"));
                if !is_temp && key.starts_with(&prefix) {
                    keys.insert(key);
                }
            }
            Ok::<_, StoreError>(keys)
        })
        .await
        .map_err(|e| StoreError::io(&bucket_dir, std::io::Error::other(e)))?
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        debug!(%bucket, %key, "LocalObjectStore::delete: called");
        let path = self.path(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object
    pub fn with_object(self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(bucket, key, bytes.into());
        self
    }

    fn insert(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert((bucket.to_string(), key.to_string()), bytes);
        }
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .map(|o| o.contains_key(&(bucket.to_string(), key.to_string())))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .ok()
            .and_then(|o| o.get(&(bucket.to_string(), key.to_string())).cloned())
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.insert(bucket, key, bytes.to_vec());
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .objects
            .lock()
            .map(|o| {
                o.keys()
                    .filter(|(b, k)| b == bucket && k.starts_with(prefix))
                    .map(|(_, k)| k.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        if let Ok(mut objects) = self.objects.lock() {
            objects.remove(&(bucket.to_string(), key.to_string()));
        }
        Ok(())
    }
}
