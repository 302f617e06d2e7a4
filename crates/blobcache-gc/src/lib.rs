//! Lifetime management (GC) for the distributed blob cache
//!
//! Keeps storage cost bounded by deleting cache blobs that age past
//! per-tenant quotas. New blobs are discovered incrementally through the
//! provider change feed instead of listing storage; a locally durable index
//! tracks what exists, how big it is, and when it was last accessed.
//!
//! Pipeline: change feed → [`ChangeFeedDispatcher`] → [`DatabaseUpdater`] →
//! [`LifetimeDatabase`] ← [`QuotaKeeper`] → blob deletions.
//!
//! A deployment must ensure a single active GC instance per database; the
//! index and cursors are single-writer resources.

pub mod atomic_state;
pub mod config;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod kv;
pub mod quota;
pub mod retry;
pub mod types;
pub mod updater;

pub use atomic_state::AtomicBlobState;
pub use config::{GcNamespaceConfig, QuotaKeeperConfig, RetryKind, RetryPolicyConfig};
pub use database::{LifetimeDatabase, LruEnumerator};
pub use dispatcher::{ChangeFeedDispatcher, DispatcherConfig, RunSummary};
pub use error::{GcError, Result};
pub use kv::{MemorySortedStore, SortedStore};
pub use quota::{QuotaKeeper, QuotaPassSummary};
pub use retry::RetryPolicy;
pub use types::{BlobPath, ContainerPurpose, ContentRecord, NamespaceId};
pub use updater::DatabaseUpdater;
