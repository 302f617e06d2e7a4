//! Translation of parsed change events into index upserts
//!
//! Both operations are idempotent; replaying a page after a crash between
//! mutation commit and cursor commit converges to the same database state.

use crate::database::LifetimeDatabase;
use crate::error::Result;
use crate::types::BlobPath;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Applies parsed events to the lifetime database
pub struct DatabaseUpdater {
    db: Arc<LifetimeDatabase>,
}

impl DatabaseUpdater {
    pub fn new(db: Arc<LifetimeDatabase>) -> Self {
        Self { db }
    }

    /// A content blob was created
    pub async fn content_created(
        &self,
        path: &BlobPath,
        size: u64,
        event_time: DateTime<Utc>,
    ) -> Result<()> {
        debug!(path = %path.blob_path(), size, "Content created");
        self.db.upsert_content(path, size, event_time).await?;
        Ok(())
    }

    /// A content hash list (metadata) blob was created
    pub async fn content_hash_list_created(
        &self,
        path: &BlobPath,
        size: u64,
        event_time: DateTime<Utc>,
    ) -> Result<()> {
        debug!(path = %path.blob_path(), size, "Content hash list created");
        self.db.upsert_content(path, size, event_time).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemorySortedStore;
    use crate::types::{ContainerPurpose, NamespaceId};

    fn path(purpose: ContainerPurpose, relative: &str) -> BlobPath {
        BlobPath {
            purpose,
            matrix: "m1".to_string(),
            namespace: NamespaceId::new("u", "n"),
            relative: relative.to_string(),
        }
    }

    #[tokio::test]
    async fn test_content_created_upserts_once() {
        let db = Arc::new(
            LifetimeDatabase::open(Arc::new(MemorySortedStore::new()))
                .await
                .unwrap(),
        );
        let updater = DatabaseUpdater::new(db.clone());
        let time = Utc::now();
        let p = path(ContainerPurpose::Content, "ab/cd");

        updater.content_created(&p, 100, time).await.unwrap();
        updater.content_created(&p, 100, time).await.unwrap();

        let ns = NamespaceId::new("u", "n");
        assert_eq!(db.namespace_size(&ns).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_hash_list_created_tracked_like_content() {
        let db = Arc::new(
            LifetimeDatabase::open(Arc::new(MemorySortedStore::new()))
                .await
                .unwrap(),
        );
        let updater = DatabaseUpdater::new(db.clone());
        let p = path(ContainerPurpose::Metadata, "sel/1");

        updater
            .content_hash_list_created(&p, 40, Utc::now())
            .await
            .unwrap();
        let ns = NamespaceId::new("u", "n");
        assert_eq!(db.namespace_size(&ns).await.unwrap(), 40);
    }
}
