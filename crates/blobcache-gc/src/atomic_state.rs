//! Per-key durable value store with optimistic concurrency
//!
//! JSON values on top of the blob service. Reads never create the backing
//! container; writes create it on demand. `read_modify_write` serializes
//! concurrent updates to one key without external locking: read with
//! version, compute, conditional write, retry on conflict under jittered
//! exponential backoff.

use crate::error::{GcError, Result};
use crate::retry::RetryPolicy;
use blobstore_client::{BlobStore, BlobStoreError, BlobVersion};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable key/value state over one blob container
pub struct AtomicBlobState {
    store: Arc<dyn BlobStore>,
    container: String,
    retry: RetryPolicy,
}

impl AtomicBlobState {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            store,
            container: container.into(),
            retry,
        }
    }

    fn key_path(&self, key: &str) -> String {
        format!("{}/{}", self.container, key)
    }

    /// Idempotently create the backing container; reports whether creation
    /// happened
    pub async fn ensure_container_exists(&self) -> Result<bool> {
        let created = self.store.create_container(&self.container).await?;
        if created {
            debug!(container = %self.container, "Created state container");
        }
        Ok(created)
    }

    /// Unconditional overwrite; creates the container on first use
    pub async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        let path = self.key_path(key);
        match self.store.put(&path, &data).await {
            Ok(_) => Ok(()),
            Err(BlobStoreError::ContainerNotFound(_)) => {
                self.ensure_container_exists().await?;
                self.store.put(&path, &data).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Current value, or `None` when the key (or the whole container) is
    /// absent; never creates anything
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(&self.key_path(key)).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Current value plus its opaque version token
    pub async fn read_with_version<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<(T, BlobVersion)>> {
        match self.store.get_with_version(&self.key_path(key)).await? {
            Some((data, version)) => Ok(Some((serde_json::from_slice(&data)?, version))),
            None => Ok(None),
        }
    }

    /// Bump last-access metadata without altering content. The provider may
    /// track this at coarse resolution; callers must tolerate imprecision.
    pub async fn touch(&self, key: &str) -> Result<()> {
        self.store.touch(&self.key_path(key)).await?;
        Ok(())
    }

    /// Atomic read-modify-write. `f` sees the current value (or `None`) and
    /// returns `(result, next_value)`; the write is guarded by the version
    /// observed at read time (create-if-absent when there is none). Conflicts
    /// and transient failures retry the whole cycle under the configured
    /// policy; exhausting the attempt cap fails the operation.
    pub async fn read_modify_write<T, R, F>(&self, key: &str, mut f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(Option<T>) -> (R, T),
    {
        let path = self.key_path(key);
        let attempts = self.retry.max_attempts();
        for attempt in 0..attempts {
            // The read is part of the retried cycle; a transient failure
            // here consumes an attempt just like one on the write.
            let current = match self.store.get_with_version(&path).await {
                Ok(current) => current,
                Err(BlobStoreError::Transient(msg)) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(key = %key, attempt, error = %msg, "Transient storage failure, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let (value, version) = match current {
                Some((data, version)) => (Some(serde_json::from_slice(&data)?), Some(version)),
                None => (None, None),
            };
            let (result, next) = f(value);
            let data = serde_json::to_vec(&next)?;

            match self.store.put_if_version(&path, &data, version.as_ref()).await {
                Ok(_) => return Ok(result),
                Err(BlobStoreError::Conflict) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(key = %key, attempt, delay_ms = delay.as_millis() as u64, "Version conflict, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(BlobStoreError::ContainerNotFound(_)) => {
                    self.ensure_container_exists().await?;
                }
                Err(BlobStoreError::Transient(msg)) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(key = %key, attempt, error = %msg, "Transient storage failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(GcError::RetriesExhausted {
            key: key.to_string(),
            attempts,
        })
    }
}
