//! Change feed event types
//!
//! The provider's own event type is not extensible, so the pipeline works
//! against this narrow variant instead. Pages may contain null entries;
//! they carry no data and are skipped by consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change a feed entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    BlobCreated,
    BlobDeleted,
    /// Anything the provider may add later; never ingested
    Other,
}

/// One change feed entry in provider order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_time: DateTime<Utc>,
    pub event_type: EventType,
    /// Provider subject string, e.g.
    /// `/blobServices/default/containers/{container}/blobs/{path}`
    pub subject: String,
    pub content_length: u64,
}

/// One page of the change feed for a single storage account
#[derive(Debug, Clone)]
pub struct FeedPage {
    /// Entries in provider order; `None` entries are diagnostic padding
    pub events: Vec<Option<ChangeEvent>>,
    /// Opaque token resuming the feed just after this page
    pub continuation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_event_serialization() {
        let event = ChangeEvent {
            event_time: Utc::now(),
            event_type: EventType::BlobCreated,
            subject: "/blobServices/default/containers/content-m1-u-n/blobs/ab/cd".to_string(),
            content_length: 128,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("BlobCreated"));
        assert!(json.contains("128"));

        let deserialized: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.subject, event.subject);
        assert_eq!(deserialized.event_type, EventType::BlobCreated);
    }

    #[test]
    fn test_event_type_equality() {
        assert_eq!(EventType::BlobCreated, EventType::BlobCreated);
        assert_ne!(EventType::BlobCreated, EventType::BlobDeleted);
    }
}
