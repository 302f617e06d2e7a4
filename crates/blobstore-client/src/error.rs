//! Error types for the blob store client

use std::fmt;

#[derive(Debug)]
pub enum BlobStoreError {
    /// Network, timeout, or service-side failure; retried per policy
    Transient(String),
    /// Conditional write lost an optimistic concurrency race
    Conflict,
    /// Write or touch targeted a container that does not exist
    ContainerNotFound(String),
    /// Touch targeted a blob that does not exist
    BlobNotFound(String),
    /// Path is not of the form `container/relative`
    InvalidPath(String),
}

impl fmt::Display for BlobStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobStoreError::Transient(msg) => write!(f, "Transient storage error: {}", msg),
            BlobStoreError::Conflict => write!(f, "Version conflict"),
            BlobStoreError::ContainerNotFound(name) => {
                write!(f, "Container not found: {}", name)
            }
            BlobStoreError::BlobNotFound(path) => write!(f, "Blob not found: {}", path),
            BlobStoreError::InvalidPath(path) => write!(f, "Invalid blob path: {}", path),
        }
    }
}

impl std::error::Error for BlobStoreError {}

pub type Result<T> = std::result::Result<T, BlobStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_error_display() {
        let err = BlobStoreError::Transient("timeout".to_string());
        assert_eq!(format!("{}", err), "Transient storage error: timeout");
    }

    #[test]
    fn test_conflict_display() {
        assert_eq!(format!("{}", BlobStoreError::Conflict), "Version conflict");
    }

    #[test]
    fn test_container_not_found_display() {
        let err = BlobStoreError::ContainerNotFound("state".to_string());
        assert_eq!(format!("{}", err), "Container not found: state");
    }
}
