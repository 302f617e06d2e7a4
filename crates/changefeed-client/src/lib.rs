//! Provider-independent blob storage change feed client
//!
//! Defines the narrow event variant and paged source abstraction the GC
//! pipeline consumes, so the core stays testable without a real provider
//! feed. A thin external adapter translates the provider's event type into
//! [`ChangeEvent`].

pub mod error;
pub mod event;
pub mod source;

pub use error::{ChangeFeedError, Result};
pub use event::{ChangeEvent, EventType, FeedPage};
pub use source::{ChangeFeedSource, FeedPosition, InMemoryChangeFeed};
