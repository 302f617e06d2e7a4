//! Error types for the GC pipeline

use blobstore_client::BlobStoreError;
use changefeed_client::ChangeFeedError;
use std::fmt;

#[derive(Debug)]
pub enum GcError {
    /// Blob service failure (transient, conflict, missing container)
    Storage(BlobStoreError),
    /// Change feed failure for one account
    Feed(ChangeFeedError),
    /// Index store failure or corrupt persisted value
    Database(String),
    /// Malformed event subject; skips the single event, never the page
    Parse(String),
    /// Event for a container purpose this pipeline does not ingest
    UnsupportedData(String),
    /// Worker observed sibling cancellation at a page boundary
    Cancelled,
    /// Optimistic read-modify-write gave up after the attempt cap
    RetriesExhausted { key: String, attempts: u32 },
    /// Invalid configuration; rejected before any I/O
    Config(String),
    /// Per-account failures of one dispatcher run, none masked
    Aggregate(Vec<(String, GcError)>),
}

impl fmt::Display for GcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcError::Storage(err) => write!(f, "Storage error: {}", err),
            GcError::Feed(err) => write!(f, "Change feed error: {}", err),
            GcError::Database(msg) => write!(f, "Database error: {}", msg),
            GcError::Parse(msg) => write!(f, "Parse error: {}", msg),
            GcError::UnsupportedData(msg) => write!(f, "Unsupported data: {}", msg),
            GcError::Cancelled => write!(f, "Cancelled"),
            GcError::RetriesExhausted { key, attempts } => {
                write!(f, "Retries exhausted for key {} after {} attempts", key, attempts)
            }
            GcError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GcError::Aggregate(failures) => {
                write!(f, "{} account(s) failed:", failures.len())?;
                for (account, err) in failures {
                    write!(f, " [{}: {}]", account, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GcError::Storage(err) => Some(err),
            GcError::Feed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BlobStoreError> for GcError {
    fn from(err: BlobStoreError) -> Self {
        GcError::Storage(err)
    }
}

impl From<ChangeFeedError> for GcError {
    fn from(err: ChangeFeedError) -> Self {
        GcError::Feed(err)
    }
}

impl From<serde_json::Error> for GcError {
    fn from(err: serde_json::Error) -> Self {
        GcError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_display() {
        let err = GcError::Database("key missing".to_string());
        assert_eq!(format!("{}", err), "Database error: key missing");
    }

    #[test]
    fn test_retries_exhausted_display() {
        let err = GcError::RetriesExhausted {
            key: "counter".to_string(),
            attempts: 5,
        };
        assert_eq!(
            format!("{}", err),
            "Retries exhausted for key counter after 5 attempts"
        );
    }

    #[test]
    fn test_aggregate_display_lists_all_causes() {
        let err = GcError::Aggregate(vec![
            ("acct1".to_string(), GcError::Cancelled),
            ("acct2".to_string(), GcError::Database("boom".to_string())),
        ]);
        let text = format!("{}", err);
        assert!(text.contains("2 account(s) failed"));
        assert!(text.contains("acct1: Cancelled"));
        assert!(text.contains("acct2: Database error: boom"));
    }

    #[test]
    fn test_storage_error_has_source() {
        use std::error::Error;
        let err = GcError::Storage(BlobStoreError::Conflict);
        assert!(err.source().is_some());
    }
}
