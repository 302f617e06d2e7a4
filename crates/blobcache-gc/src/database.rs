//! Durable lifetime index
//!
//! Persists, per database: the bootstrap time, one continuation cursor per
//! storage account, and one content record per (namespace, path). Key layout
//! over the sorted store:
//!
//! - `meta/bootstrap` → bootstrap time
//! - `cursor/{account}` → continuation token
//! - `content/{universe}/{namespace}/{relative}` → [`ContentRecord`]
//!
//! The database is a single-writer resource; concurrent GC instances against
//! the same store are unsupported and must be prevented externally.

use crate::error::{GcError, Result};
use crate::kv::SortedStore;
use crate::types::{BlobPath, ContentRecord, NamespaceId};
use chrono::{DateTime, Utc};
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

const BOOTSTRAP_KEY: &str = "meta/bootstrap";
const CURSOR_PREFIX: &str = "cursor/";
const CONTENT_PREFIX: &str = "content/";

/// Page size for internal prefix scans
const SCAN_PAGE: usize = 1024;

fn content_key(namespace: &NamespaceId, relative: &str) -> String {
    format!(
        "{}{}/{}/{}",
        CONTENT_PREFIX, namespace.universe, namespace.namespace, relative
    )
}

fn namespace_prefix(namespace: &NamespaceId) -> String {
    format!("{}{}/{}/", CONTENT_PREFIX, namespace.universe, namespace.namespace)
}

/// Durable index of cache content, cursors, and bootstrap time
pub struct LifetimeDatabase {
    store: Arc<dyn SortedStore>,
    bootstrap: DateTime<Utc>,
}

impl LifetimeDatabase {
    /// Open the database, recording the bootstrap time on first creation
    pub async fn open(store: Arc<dyn SortedStore>) -> Result<Self> {
        let bootstrap = match store.get(BOOTSTRAP_KEY).await? {
            Some(raw) => serde_json::from_slice(&raw)?,
            None => {
                let now = Utc::now();
                store.put(BOOTSTRAP_KEY, &serde_json::to_vec(&now)?).await?;
                info!(bootstrap = %now, "Initialized lifetime database");
                now
            }
        };
        Ok(Self { store, bootstrap })
    }

    /// Time the database was first created; accounts with no cursor start here
    pub fn bootstrap_time(&self) -> DateTime<Utc> {
        self.bootstrap
    }

    pub async fn get_cursor(&self, account: &str) -> Result<Option<String>> {
        let key = format!("{}{}", CURSOR_PREFIX, account);
        match self.store.get(&key).await? {
            Some(raw) => Ok(Some(String::from_utf8(raw).map_err(|_| {
                GcError::Database(format!("corrupt cursor for account {}", account))
            })?)),
            None => Ok(None),
        }
    }

    /// Persist an account's continuation token. Callers commit a page's
    /// mutations first; replay from a stale cursor is idempotent.
    pub async fn set_cursor(&self, account: &str, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(GcError::Database(format!(
                "refusing empty cursor for account {}",
                account
            )));
        }
        let key = format!("{}{}", CURSOR_PREFIX, account);
        self.store.put(&key, token.as_bytes()).await?;
        debug!(account = %account, cursor = %token, "Committed cursor");
        Ok(())
    }

    /// Idempotent upsert of one content record. Size and last-access are
    /// merged with any existing record and never regress. Returns whether the
    /// stored record changed.
    pub async fn upsert_content(
        &self,
        path: &BlobPath,
        size: u64,
        event_time: DateTime<Utc>,
    ) -> Result<bool> {
        let key = content_key(&path.namespace, &path.relative);
        let merged = match self.store.get(&key).await? {
            Some(raw) => {
                let existing: ContentRecord = serde_json::from_slice(&raw)?;
                let merged = ContentRecord {
                    path: existing.path.clone(),
                    size: existing.size.max(size),
                    last_access: existing.last_access.max(event_time),
                };
                if merged == existing {
                    return Ok(false);
                }
                merged
            }
            None => ContentRecord {
                path: path.clone(),
                size,
                last_access: event_time,
            },
        };
        self.store.put(&key, &serde_json::to_vec(&merged)?).await?;
        Ok(true)
    }

    pub async fn get_content(
        &self,
        namespace: &NamespaceId,
        relative: &str,
    ) -> Result<Option<ContentRecord>> {
        match self.store.get(&content_key(namespace, relative)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Remove one content record (quota eviction only)
    pub async fn delete_content(&self, record: &ContentRecord) -> Result<()> {
        let key = content_key(&record.path.namespace, &record.path.relative);
        self.store.delete(&key).await
    }

    /// Tracked total size of a namespace, summed from its records
    pub async fn namespace_size(&self, namespace: &NamespaceId) -> Result<u64> {
        let prefix = namespace_prefix(namespace);
        let mut total = 0u64;
        let mut after: Option<String> = None;
        loop {
            let page = self
                .store
                .scan_prefix(&prefix, after.as_deref(), SCAN_PAGE)
                .await?;
            if page.is_empty() {
                break;
            }
            for (_, raw) in &page {
                let record: ContentRecord = serde_json::from_slice(raw)?;
                total += record.size;
            }
            after = page.last().map(|(key, _)| key.clone());
        }
        Ok(total)
    }

    /// Lazy, resumable oldest-first enumeration of a namespace's records.
    ///
    /// Each materialized chunk covers `percentile_step` of the remaining
    /// candidate space (at least `batch_size` records), selected with one
    /// bounded-memory scan. Order is exact within the database's current
    /// state but is a sampling granularity, not a global-LRU guarantee,
    /// when records mutate between chunks.
    pub fn enumerate_by_last_access(
        &self,
        namespace: &NamespaceId,
        batch_size: usize,
        percentile_step: f64,
    ) -> LruEnumerator<'_> {
        LruEnumerator {
            db: self,
            prefix: namespace_prefix(namespace),
            batch_size: batch_size.max(1),
            percentile_step: percentile_step.clamp(f64::MIN_POSITIVE, 1.0),
            bound: None,
            buffered: VecDeque::new(),
            exhausted: false,
        }
    }
}

/// Oldest-first enumeration state over one namespace
pub struct LruEnumerator<'a> {
    db: &'a LifetimeDatabase,
    prefix: String,
    batch_size: usize,
    percentile_step: f64,
    /// Resume strictly after this (last_access, key) pair
    bound: Option<(DateTime<Utc>, String)>,
    buffered: VecDeque<ContentRecord>,
    exhausted: bool,
}

impl<'a> LruEnumerator<'a> {
    /// Next batch of up to `batch_size` records ascending by last access;
    /// empty when the namespace is exhausted.
    pub async fn next_batch(&mut self) -> Result<Vec<ContentRecord>> {
        if self.buffered.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        let take = self.batch_size.min(self.buffered.len());
        Ok(self.buffered.drain(..take).collect())
    }

    fn is_candidate(&self, last_access: DateTime<Utc>, key: &str) -> bool {
        match &self.bound {
            Some((bound_time, bound_key)) => {
                (last_access, key) > (*bound_time, bound_key.as_str())
            }
            None => true,
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let remaining = self.count_candidates().await?;
        if remaining == 0 {
            self.exhausted = true;
            return Ok(());
        }
        let chunk = ((remaining as f64 * self.percentile_step).ceil() as usize)
            .max(self.batch_size)
            .min(remaining);

        // Max-heap capped at `chunk` keeps the oldest records seen so far.
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(chunk + 1);
        let mut after: Option<String> = None;
        loop {
            let page = self
                .db
                .store
                .scan_prefix(&self.prefix, after.as_deref(), SCAN_PAGE)
                .await?;
            if page.is_empty() {
                break;
            }
            for (key, raw) in &page {
                let record: ContentRecord = serde_json::from_slice(raw)?;
                if !self.is_candidate(record.last_access, key) {
                    continue;
                }
                heap.push(HeapEntry {
                    last_access: record.last_access,
                    key: key.clone(),
                    record,
                });
                if heap.len() > chunk {
                    heap.pop();
                }
            }
            after = page.last().map(|(key, _)| key.clone());
        }

        let mut selected: Vec<HeapEntry> = heap.into_vec();
        selected.sort_by(|a, b| (a.last_access, &a.key).cmp(&(b.last_access, &b.key)));
        if let Some(last) = selected.last() {
            self.bound = Some((last.last_access, last.key.clone()));
        }
        debug!(
            prefix = %self.prefix,
            chunk = selected.len(),
            remaining,
            "Materialized LRU enumeration chunk"
        );
        self.buffered = selected.into_iter().map(|entry| entry.record).collect();
        Ok(())
    }

    async fn count_candidates(&self) -> Result<usize> {
        let mut count = 0usize;
        let mut after: Option<String> = None;
        loop {
            let page = self
                .db
                .store
                .scan_prefix(&self.prefix, after.as_deref(), SCAN_PAGE)
                .await?;
            if page.is_empty() {
                break;
            }
            for (key, raw) in &page {
                let record: ContentRecord = serde_json::from_slice(raw)?;
                if self.is_candidate(record.last_access, key) {
                    count += 1;
                }
            }
            after = page.last().map(|(key, _)| key.clone());
        }
        Ok(count)
    }
}

struct HeapEntry {
    last_access: DateTime<Utc>,
    key: String,
    record: ContentRecord,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.last_access == other.last_access && self.key == other.key
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.last_access, &self.key).cmp(&(other.last_access, &other.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemorySortedStore;
    use crate::types::{BlobPath, ContainerPurpose};
    use chrono::Duration;

    fn path(relative: &str) -> BlobPath {
        BlobPath {
            purpose: ContainerPurpose::Content,
            matrix: "m1".to_string(),
            namespace: NamespaceId::new("u", "n"),
            relative: relative.to_string(),
        }
    }

    async fn open_db() -> LifetimeDatabase {
        LifetimeDatabase::open(Arc::new(MemorySortedStore::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_time_is_fixed_across_reopens() {
        let store: Arc<dyn SortedStore> = Arc::new(MemorySortedStore::new());
        let first = LifetimeDatabase::open(store.clone()).await.unwrap();
        let t0 = first.bootstrap_time();
        drop(first);
        let second = LifetimeDatabase::open(store).await.unwrap();
        assert_eq!(second.bootstrap_time(), t0);
    }

    #[tokio::test]
    async fn test_cursor_round_trip() {
        let db = open_db().await;
        assert!(db.get_cursor("acct").await.unwrap().is_none());
        db.set_cursor("acct", "token-1").await.unwrap();
        assert_eq!(db.get_cursor("acct").await.unwrap().unwrap(), "token-1");
        db.set_cursor("acct", "token-2").await.unwrap();
        assert_eq!(db.get_cursor("acct").await.unwrap().unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_empty_cursor_rejected() {
        let db = open_db().await;
        assert!(db.set_cursor("acct", "").await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = open_db().await;
        let time = Utc::now();
        assert!(db.upsert_content(&path("a"), 100, time).await.unwrap());
        assert!(!db.upsert_content(&path("a"), 100, time).await.unwrap());

        let ns = NamespaceId::new("u", "n");
        assert_eq!(db.namespace_size(&ns).await.unwrap(), 100);
        let record = db.get_content(&ns, "a").await.unwrap().unwrap();
        assert_eq!(record.size, 100);
        assert_eq!(record.last_access, time);
    }

    #[tokio::test]
    async fn test_upsert_never_decreases_size_or_access_time() {
        let db = open_db().await;
        let ns = NamespaceId::new("u", "n");
        let time = Utc::now();
        db.upsert_content(&path("a"), 100, time).await.unwrap();
        // Later, smaller observation must not shrink the record
        db.upsert_content(&path("a"), 40, time - Duration::hours(1))
            .await
            .unwrap();

        let record = db.get_content(&ns, "a").await.unwrap().unwrap();
        assert_eq!(record.size, 100);
        assert_eq!(record.last_access, time);
    }

    #[tokio::test]
    async fn test_upsert_advances_last_access() {
        let db = open_db().await;
        let ns = NamespaceId::new("u", "n");
        let time = Utc::now();
        db.upsert_content(&path("a"), 100, time).await.unwrap();
        db.upsert_content(&path("a"), 100, time + Duration::hours(1))
            .await
            .unwrap();
        let record = db.get_content(&ns, "a").await.unwrap().unwrap();
        assert_eq!(record.last_access, time + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_delete_content_removes_record() {
        let db = open_db().await;
        let ns = NamespaceId::new("u", "n");
        db.upsert_content(&path("a"), 100, Utc::now()).await.unwrap();
        let record = db.get_content(&ns, "a").await.unwrap().unwrap();
        db.delete_content(&record).await.unwrap();
        assert!(db.get_content(&ns, "a").await.unwrap().is_none());
        assert_eq!(db.namespace_size(&ns).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_namespace_size_ignores_other_namespaces() {
        let db = open_db().await;
        db.upsert_content(&path("a"), 100, Utc::now()).await.unwrap();
        let mut other = path("b");
        other.namespace = NamespaceId::new("u", "other");
        db.upsert_content(&other, 500, Utc::now()).await.unwrap();

        assert_eq!(
            db.namespace_size(&NamespaceId::new("u", "n")).await.unwrap(),
            100
        );
    }

    #[tokio::test]
    async fn test_enumeration_is_oldest_first() {
        let db = open_db().await;
        let base = Utc::now();
        for (relative, age_hours) in [("a", 1), ("b", 5), ("c", 3)] {
            db.upsert_content(&path(relative), 10, base - Duration::hours(age_hours))
                .await
                .unwrap();
        }

        let ns = NamespaceId::new("u", "n");
        let mut enumerator = db.enumerate_by_last_access(&ns, 10, 1.0);
        let batch = enumerator.next_batch().await.unwrap();
        let order: Vec<&str> = batch.iter().map(|r| r.path.relative.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert!(enumerator.next_batch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enumeration_resumes_across_chunks_without_duplicates() {
        let db = open_db().await;
        let base = Utc::now();
        for i in 0..20 {
            db.upsert_content(&path(&format!("r{:02}", i)), 1, base - Duration::minutes(20 - i))
                .await
                .unwrap();
        }

        let ns = NamespaceId::new("u", "n");
        // Small batch and step force several chunks
        let mut enumerator = db.enumerate_by_last_access(&ns, 3, 0.05);
        let mut seen = Vec::new();
        loop {
            let batch = enumerator.next_batch().await.unwrap();
            if batch.is_empty() {
                break;
            }
            seen.extend(batch);
        }

        assert_eq!(seen.len(), 20);
        for pair in seen.windows(2) {
            assert!(pair[0].last_access <= pair[1].last_access);
        }
        let mut relatives: Vec<String> =
            seen.iter().map(|r| r.path.relative.clone()).collect();
        relatives.dedup();
        assert_eq!(relatives.len(), 20);
    }

    #[tokio::test]
    async fn test_enumeration_of_empty_namespace() {
        let db = open_db().await;
        let ns = NamespaceId::new("u", "n");
        let mut enumerator = db.enumerate_by_last_access(&ns, 10, 0.05);
        assert!(enumerator.next_batch().await.unwrap().is_empty());
    }
}
