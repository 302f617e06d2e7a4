//! Paged change feed source abstraction
//!
//! A feed is consumed one page at a time per storage account, resumable by
//! the continuation token of the last durably processed page, or by a start
//! timestamp when no token exists yet. [`InMemoryChangeFeed`] backs tests and
//! local development.

use crate::error::{ChangeFeedError, Result};
use crate::event::{ChangeEvent, FeedPage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Where to resume reading an account's feed
#[derive(Debug, Clone)]
pub enum FeedPosition {
    /// Resume just after the page that produced this token
    Continuation(String),
    /// No token yet; start from events at or after this time
    Since(DateTime<Utc>),
}

/// Source of change feed pages, one feed per storage account
#[async_trait]
pub trait ChangeFeedSource: Send + Sync {
    /// Read the next page at `position`, or `None` when the feed is exhausted
    async fn read_page(&self, account: &str, position: &FeedPosition)
        -> Result<Option<FeedPage>>;
}

#[derive(Default)]
struct AccountFeed {
    pages: Vec<Vec<Option<ChangeEvent>>>,
    fail_transient: bool,
}

/// In-memory change feed with sequential continuation tokens
#[derive(Default)]
pub struct InMemoryChangeFeed {
    accounts: RwLock<HashMap<String, AccountFeed>>,
}

impl InMemoryChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page to an account's feed
    pub async fn push_page(&self, account: &str, events: Vec<Option<ChangeEvent>>) {
        let mut accounts = self.accounts.write().await;
        accounts.entry(account.to_string()).or_default().pages.push(events);
    }

    /// Make every subsequent read for this account fail with a transient error
    pub async fn fail_account(&self, account: &str) {
        let mut accounts = self.accounts.write().await;
        accounts.entry(account.to_string()).or_default().fail_transient = true;
    }

    fn page_index(&self, feed: &AccountFeed, position: &FeedPosition) -> Result<usize> {
        match position {
            FeedPosition::Continuation(token) => token
                .parse::<usize>()
                .map_err(|_| ChangeFeedError::Parse(format!("Bad continuation token: {}", token))),
            FeedPosition::Since(since) => {
                // Skip leading pages whose events all predate the start time.
                let idx = feed.pages.iter().position(|page| {
                    page.iter()
                        .flatten()
                        .any(|event| event.event_time >= *since)
                });
                Ok(idx.unwrap_or(feed.pages.len()))
            }
        }
    }
}

#[async_trait]
impl ChangeFeedSource for InMemoryChangeFeed {
    async fn read_page(
        &self,
        account: &str,
        position: &FeedPosition,
    ) -> Result<Option<FeedPage>> {
        let accounts = self.accounts.read().await;
        let Some(feed) = accounts.get(account) else {
            return Ok(None);
        };
        if feed.fail_transient {
            return Err(ChangeFeedError::Transient(format!(
                "injected failure for account {}",
                account
            )));
        }

        let index = self.page_index(feed, position)?;
        if index >= feed.pages.len() {
            return Ok(None);
        }

        debug!(account = %account, page = index, "Serving change feed page");
        Ok(Some(FeedPage {
            events: feed.pages[index].clone(),
            continuation: (index + 1).to_string(),
        }))
    }
}
