//! Per-namespace quota enforcement
//!
//! Walks each over-quota namespace oldest-first and deletes blobs until the
//! tracked size fits the quota, never touching records younger than the
//! configured age floor. Blob deletion is idempotent (an already-absent blob
//! counts as deleted) and best-effort per record: a failed delete is logged
//! and the pass continues.

use crate::config::{GcNamespaceConfig, QuotaKeeperConfig};
use crate::database::LifetimeDatabase;
use crate::error::Result;
use crate::types::NamespaceId;
use blobstore_client::BlobStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one namespace's eviction pass
#[derive(Debug, Clone)]
pub struct QuotaPassSummary {
    pub namespace: NamespaceId,
    pub starting_size: u64,
    pub final_size: u64,
    pub quota: u64,
    pub deleted_records: u64,
    pub freed_bytes: u64,
    pub failed_deletes: u64,
    /// The pass ended while still over quota because every remaining
    /// candidate was younger than the age floor
    pub ended_over_quota: bool,
}

/// Enforces per-namespace size quotas against the lifetime database
pub struct QuotaKeeper {
    db: Arc<LifetimeDatabase>,
    blobs: Arc<dyn BlobStore>,
    config: QuotaKeeperConfig,
}

impl QuotaKeeper {
    /// Fails fast on invalid configuration, before any I/O
    pub fn new(
        db: Arc<LifetimeDatabase>,
        blobs: Arc<dyn BlobStore>,
        config: QuotaKeeperConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { db, blobs, config })
    }

    /// Run one eviction pass over every configured namespace.
    ///
    /// Namespaces are independent; an over-quota end state is reported in the
    /// summary, not an error.
    pub async fn enforce_quotas(&self) -> Result<Vec<QuotaPassSummary>> {
        let now = Utc::now();
        let mut summaries = Vec::with_capacity(self.config.namespaces.len());
        for ns_config in &self.config.namespaces {
            summaries.push(self.enforce_namespace(ns_config, now).await?);
        }
        Ok(summaries)
    }

    async fn enforce_namespace(
        &self,
        ns_config: &GcNamespaceConfig,
        now: DateTime<Utc>,
    ) -> Result<QuotaPassSummary> {
        let namespace = ns_config.namespace_id();
        let quota = ns_config.max_size_bytes();
        let threshold = self.config.deletion_threshold();

        let starting_size = self.db.namespace_size(&namespace).await?;
        let mut summary = QuotaPassSummary {
            namespace: namespace.clone(),
            starting_size,
            final_size: starting_size,
            quota,
            deleted_records: 0,
            freed_bytes: 0,
            failed_deletes: 0,
            ended_over_quota: false,
        };
        if starting_size <= quota {
            debug!(namespace = %namespace, size = starting_size, quota, "Namespace within quota");
            return Ok(summary);
        }

        info!(
            namespace = %namespace,
            size = starting_size,
            quota,
            "Namespace over quota, evicting oldest content"
        );
        let mut size = starting_size;
        let mut enumerator = self.db.enumerate_by_last_access(
            &namespace,
            self.config.lru_enumeration_batch_size,
            self.config.lru_enumeration_percentile_step,
        );

        'pass: loop {
            let batch = enumerator.next_batch().await?;
            if batch.is_empty() {
                break;
            }
            for record in &batch {
                if size <= quota {
                    break 'pass;
                }
                if now - record.last_access < threshold {
                    // Enumeration is oldest-first; everything after this
                    // candidate is younger still
                    summary.ended_over_quota = true;
                    break 'pass;
                }
                match self.blobs.delete(&record.path.blob_path()).await {
                    Ok(existed) => {
                        if !existed {
                            debug!(path = %record.path.blob_path(), "Blob already absent");
                        }
                        self.db.delete_content(record).await?;
                        size = size.saturating_sub(record.size);
                        summary.deleted_records += 1;
                        summary.freed_bytes += record.size;
                    }
                    Err(err) => {
                        warn!(
                            path = %record.path.blob_path(),
                            error = %err,
                            "Failed to delete blob, continuing pass"
                        );
                        summary.failed_deletes += 1;
                    }
                }
            }
        }

        summary.final_size = size;
        summary.ended_over_quota |= size > quota;
        info!(
            namespace = %namespace,
            freed = summary.freed_bytes,
            deleted = summary.deleted_records,
            failed = summary.failed_deletes,
            final_size = summary.final_size,
            over_quota = summary.ended_over_quota,
            "Quota pass finished"
        );
        Ok(summary)
    }
}
