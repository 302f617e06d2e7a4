//! Change feed ingestion
//!
//! One dispatcher run walks every configured storage account concurrently,
//! resuming each from its persisted cursor (or the database bootstrap time),
//! and applies blob-creation events to the lifetime database. A page's
//! mutations are committed before its continuation token, so replay after a
//! crash is idempotent. The first page failure cancels sibling workers
//! cooperatively at their next page boundary; failures are aggregated, never
//! masked.

use crate::database::LifetimeDatabase;
use crate::error::{GcError, Result};
use crate::types::{BlobPath, ContainerPurpose};
use crate::updater::DatabaseUpdater;
use changefeed_client::{ChangeFeedSource, EventType, FeedPosition};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Accounts to ingest and the currently active shard matrix
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub accounts: Vec<String>,
    /// Events whose container matrix differs are stale post-resharding
    /// traffic and are discarded
    pub active_matrix: String,
}

/// Per-account ingestion counters
#[derive(Debug, Default, Clone)]
struct AccountSummary {
    pages: u64,
    applied: u64,
    skipped: u64,
    stale_matrix: u64,
}

/// Aggregated counters for one dispatcher run
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub accounts: usize,
    pub pages: u64,
    pub events_applied: u64,
    pub events_skipped: u64,
    pub stale_matrix_events: u64,
}

/// Drives change feed consumption into the lifetime database
pub struct ChangeFeedDispatcher {
    db: Arc<LifetimeDatabase>,
    feed: Arc<dyn ChangeFeedSource>,
    config: DispatcherConfig,
}

impl ChangeFeedDispatcher {
    pub fn new(
        db: Arc<LifetimeDatabase>,
        feed: Arc<dyn ChangeFeedSource>,
        config: DispatcherConfig,
    ) -> Self {
        Self { db, feed, config }
    }

    /// Ingest all changes up to now, one concurrent worker per account.
    ///
    /// Succeeds only if every account succeeds; otherwise every per-account
    /// failure is reported together. Cursor advances committed before a
    /// failure remain valid.
    pub async fn consume_new_changes(&self) -> Result<RunSummary> {
        let now = Utc::now();
        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();

        for account in &self.config.accounts {
            let account = account.clone();
            let db = self.db.clone();
            let feed = self.feed.clone();
            let matrix = self.config.active_matrix.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                let result = consume_account(&db, feed.as_ref(), &account, &matrix, now, &cancel).await;
                if result.is_err() {
                    cancel.cancel();
                }
                (account, result)
            });
        }

        let mut summary = RunSummary {
            accounts: self.config.accounts.len(),
            ..Default::default()
        };
        let mut failures = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((account, Ok(account_summary))) => {
                    debug!(
                        account = %account,
                        pages = account_summary.pages,
                        applied = account_summary.applied,
                        "Account feed consumed"
                    );
                    summary.pages += account_summary.pages;
                    summary.events_applied += account_summary.applied;
                    summary.events_skipped += account_summary.skipped;
                    summary.stale_matrix_events += account_summary.stale_matrix;
                }
                Ok((account, Err(err))) => {
                    warn!(account = %account, error = %err, "Account feed failed");
                    failures.push((account, err));
                }
                Err(join_err) => {
                    failures.push((
                        "<worker>".to_string(),
                        GcError::Database(format!("worker panicked: {}", join_err)),
                    ));
                }
            }
        }

        if failures.is_empty() {
            info!(
                accounts = summary.accounts,
                pages = summary.pages,
                applied = summary.events_applied,
                skipped = summary.events_skipped,
                "Change feed run complete"
            );
            Ok(summary)
        } else {
            Err(GcError::Aggregate(failures))
        }
    }
}

async fn consume_account(
    db: &Arc<LifetimeDatabase>,
    feed: &dyn ChangeFeedSource,
    account: &str,
    active_matrix: &str,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<AccountSummary> {
    let updater = DatabaseUpdater::new(db.clone());
    let mut position = match db.get_cursor(account).await? {
        Some(token) => FeedPosition::Continuation(token),
        None => FeedPosition::Since(db.bootstrap_time()),
    };
    let mut summary = AccountSummary::default();
    let mut max_event_time: Option<DateTime<Utc>> = None;

    loop {
        // Cooperative cancellation, checked at page boundaries only
        if cancel.is_cancelled() {
            return Err(GcError::Cancelled);
        }

        let Some(page) = feed.read_page(account, &position).await? else {
            break;
        };

        for entry in &page.events {
            let Some(event) = entry else {
                debug!(account = %account, "Null change feed entry");
                summary.skipped += 1;
                continue;
            };
            max_event_time = Some(match max_event_time {
                Some(t) => t.max(event.event_time),
                None => event.event_time,
            });

            if event.event_type != EventType::BlobCreated {
                // Deletions are self-inflicted by this GC; never re-ingested
                summary.skipped += 1;
                continue;
            }
            let path = match BlobPath::parse_subject(&event.subject) {
                Ok(path) => path,
                Err(err) => {
                    warn!(
                        account = %account,
                        subject = %event.subject,
                        error = %err,
                        "Skipping unparseable event"
                    );
                    summary.skipped += 1;
                    continue;
                }
            };
            if path.matrix != active_matrix {
                summary.stale_matrix += 1;
                continue;
            }

            match path.purpose {
                ContainerPurpose::Content => {
                    updater
                        .content_created(&path, event.content_length, event.event_time)
                        .await?;
                }
                ContainerPurpose::Metadata => {
                    updater
                        .content_hash_list_created(&path, event.content_length, event.event_time)
                        .await?;
                }
                ContainerPurpose::Checkpoint => {
                    return Err(GcError::UnsupportedData(format!(
                        "unexpected container purpose in subject {}",
                        event.subject
                    )));
                }
            }
            summary.applied += 1;
        }

        // Mutations are durable; only now does the cursor advance
        db.set_cursor(account, &page.continuation).await?;
        summary.pages += 1;
        position = FeedPosition::Continuation(page.continuation);

        if let Some(t) = max_event_time {
            if t > now {
                debug!(account = %account, "Reached events newer than run snapshot, deferring");
                break;
            }
        }
    }

    Ok(summary)
}
