//! Durable ordered key-value seam
//!
//! The embedded storage engine is an external collaborator; the index only
//! needs point operations and ascending prefix scans, so it is consumed
//! through this narrow trait. [`MemorySortedStore`] backs tests and local
//! development.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::RwLock;

/// Durable sorted store: point lookups plus ordered range scans
#[async_trait]
pub trait SortedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Up to `limit` entries whose keys start with `prefix`, in ascending key
    /// order, starting strictly after `after` when given.
    async fn scan_prefix(
        &self,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>>;
}

/// BTreeMap-backed [`SortedStore`]
#[derive(Default)]
pub struct MemorySortedStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemorySortedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SortedStore for MemorySortedStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>> {
        let entries = self.entries.read().await;
        let start = match after {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        Ok(entries
            .range((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(limit)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
