//! Blob store trait and version tokens

use crate::error::Result;
use async_trait::async_trait;

/// Opaque version token returned by writes and used to guard conditional ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobVersion(pub String);

impl BlobVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Async client surface of the blob storage service.
///
/// Paths are `container/relative` strings. Reads on a missing container or
/// blob return `Ok(None)` and never create anything; writes and touches on a
/// missing container fail with `ContainerNotFound`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Read the blob together with its current version token
    async fn get_with_version(&self, path: &str) -> Result<Option<(Vec<u8>, BlobVersion)>>;

    /// Unconditional overwrite; returns the new version
    async fn put(&self, path: &str, data: &[u8]) -> Result<BlobVersion>;

    /// Conditional write. With `Some(version)` the write succeeds only if the
    /// blob's current version matches; with `None` only if the blob is absent.
    /// A mismatch fails with `Conflict`.
    async fn put_if_version(
        &self,
        path: &str,
        data: &[u8],
        expected: Option<&BlobVersion>,
    ) -> Result<BlobVersion>;

    /// Delete a blob; returns whether it existed. Deleting an absent blob is
    /// not an error.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// Bump the blob's last-access metadata without altering content.
    /// Providers may track this at coarse resolution.
    async fn touch(&self, path: &str) -> Result<()>;

    async fn container_exists(&self, container: &str) -> Result<bool>;

    /// Idempotently create a container; returns whether creation happened
    async fn create_container(&self, container: &str) -> Result<bool>;
}
