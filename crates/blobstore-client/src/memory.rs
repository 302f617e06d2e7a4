//! In-memory blob store
//!
//! Mirrors the provider contract closely enough for the GC pipeline's tests:
//! real version tokens, conflict on mismatched conditional writes, and
//! per-blob last-access timestamps.

use crate::error::{BlobStoreError, Result};
use crate::store::{BlobStore, BlobVersion};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct Blob {
    data: Vec<u8>,
    version: u64,
    last_access: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    containers: HashMap<String, HashMap<String, Blob>>,
    next_version: u64,
}

/// In-memory [`BlobStore`] implementation
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: RwLock<Inner>,
}

fn split_path(path: &str) -> Result<(&str, &str)> {
    path.split_once('/')
        .filter(|(container, blob)| !container.is_empty() && !blob.is_empty())
        .ok_or_else(|| BlobStoreError::InvalidPath(path.to_string()))
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-access time of a blob, if present (test helper)
    pub async fn last_access(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        let (container, blob) = split_path(path)?;
        let inner = self.inner.read().await;
        Ok(inner
            .containers
            .get(container)
            .and_then(|blobs| blobs.get(blob))
            .map(|b| b.last_access))
    }

    /// Number of blobs across all containers (test helper)
    pub async fn blob_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner.containers.values().map(|blobs| blobs.len()).sum()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get_with_version(path).await?.map(|(data, _)| data))
    }

    async fn get_with_version(&self, path: &str) -> Result<Option<(Vec<u8>, BlobVersion)>> {
        let (container, blob) = split_path(path)?;
        let inner = self.inner.read().await;
        Ok(inner
            .containers
            .get(container)
            .and_then(|blobs| blobs.get(blob))
            .map(|b| (b.data.clone(), BlobVersion(b.version.to_string()))))
    }

    async fn put(&self, path: &str, data: &[u8]) -> Result<BlobVersion> {
        let (container, blob) = split_path(path)?;
        let mut inner = self.inner.write().await;
        inner.next_version += 1;
        let version = inner.next_version;
        let blobs = inner
            .containers
            .get_mut(container)
            .ok_or_else(|| BlobStoreError::ContainerNotFound(container.to_string()))?;
        blobs.insert(
            blob.to_string(),
            Blob {
                data: data.to_vec(),
                version,
                last_access: Utc::now(),
            },
        );
        Ok(BlobVersion(version.to_string()))
    }

    async fn put_if_version(
        &self,
        path: &str,
        data: &[u8],
        expected: Option<&BlobVersion>,
    ) -> Result<BlobVersion> {
        let (container, blob) = split_path(path)?;
        let mut inner = self.inner.write().await;
        inner.next_version += 1;
        let version = inner.next_version;
        let blobs = inner
            .containers
            .get_mut(container)
            .ok_or_else(|| BlobStoreError::ContainerNotFound(container.to_string()))?;

        let current = blobs.get(blob).map(|b| b.version.to_string());
        let matches = match (expected, &current) {
            (None, None) => true,
            (Some(want), Some(have)) => want.as_str() == have,
            _ => false,
        };
        if !matches {
            return Err(BlobStoreError::Conflict);
        }

        blobs.insert(
            blob.to_string(),
            Blob {
                data: data.to_vec(),
                version,
                last_access: Utc::now(),
            },
        );
        Ok(BlobVersion(version.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let (container, blob) = split_path(path)?;
        let mut inner = self.inner.write().await;
        let existed = inner
            .containers
            .get_mut(container)
            .map(|blobs| blobs.remove(blob).is_some())
            .unwrap_or(false);
        debug!(path = %path, existed, "Deleted blob");
        Ok(existed)
    }

    async fn touch(&self, path: &str) -> Result<()> {
        let (container, blob) = split_path(path)?;
        let mut inner = self.inner.write().await;
        let blobs = inner
            .containers
            .get_mut(container)
            .ok_or_else(|| BlobStoreError::ContainerNotFound(container.to_string()))?;
        let entry = blobs
            .get_mut(blob)
            .ok_or_else(|| BlobStoreError::BlobNotFound(path.to_string()))?;
        entry.last_access = Utc::now();
        Ok(())
    }

    async fn container_exists(&self, container: &str) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.containers.contains_key(container))
    }

    async fn create_container(&self, container: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner.containers.contains_key(container) {
            return Ok(false);
        }
        inner.containers.insert(container.to_string(), HashMap::new());
        debug!(container = %container, "Created container");
        Ok(true)
    }
}
