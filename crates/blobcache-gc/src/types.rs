//! Core data model: namespaces, blob paths, content records
//!
//! Container names encode purpose, shard matrix, and tenant:
//! `{purpose}-{matrix}-{universe}-{namespace}`. Change event subjects follow
//! the provider shape `/blobServices/default/containers/{container}/blobs/{path}`.

use crate::error::{GcError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const SUBJECT_CONTAINER_PREFIX: &str = "/blobServices/default/containers/";
const SUBJECT_BLOB_SEPARATOR: &str = "/blobs/";

/// One independent quota/GC domain (tenant)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceId {
    pub universe: String,
    pub namespace: String,
}

impl NamespaceId {
    pub fn new(universe: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            universe: universe.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.universe, self.namespace)
    }
}

/// What a container holds, parsed from its name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerPurpose {
    Content,
    Metadata,
    Checkpoint,
}

impl ContainerPurpose {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "content" => Some(ContainerPurpose::Content),
            "metadata" => Some(ContainerPurpose::Metadata),
            "checkpoint" => Some(ContainerPurpose::Checkpoint),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ContainerPurpose::Content => "content",
            ContainerPurpose::Metadata => "metadata",
            ContainerPurpose::Checkpoint => "checkpoint",
        }
    }
}

/// Location of one blob, as recovered from a change event subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobPath {
    pub purpose: ContainerPurpose,
    /// Sharding layout generation; events from older layouts are discarded
    pub matrix: String,
    pub namespace: NamespaceId,
    /// Path relative to the container
    pub relative: String,
}

impl BlobPath {
    /// Parse a provider change event subject.
    ///
    /// The purpose, matrix, and universe segments of the container name must
    /// not themselves contain `-`; the namespace segment may.
    pub fn parse_subject(subject: &str) -> Result<Self> {
        let rest = subject
            .strip_prefix(SUBJECT_CONTAINER_PREFIX)
            .ok_or_else(|| GcError::Parse(format!("Unrecognized subject: {}", subject)))?;
        let (container, relative) = rest
            .split_once(SUBJECT_BLOB_SEPARATOR)
            .ok_or_else(|| GcError::Parse(format!("Subject has no blob segment: {}", subject)))?;
        if relative.is_empty() {
            return Err(GcError::Parse(format!("Subject has empty blob path: {}", subject)));
        }

        let mut parts = container.splitn(4, '-');
        let (purpose, matrix, universe, namespace) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(p), Some(m), Some(u), Some(n))
                    if !m.is_empty() && !u.is_empty() && !n.is_empty() =>
                {
                    (p, m, u, n)
                }
                _ => {
                    return Err(GcError::Parse(format!(
                        "Malformed container name: {}",
                        container
                    )))
                }
            };
        let purpose = ContainerPurpose::parse(purpose)
            .ok_or_else(|| GcError::Parse(format!("Unknown container purpose: {}", container)))?;

        Ok(Self {
            purpose,
            matrix: matrix.to_string(),
            namespace: NamespaceId::new(universe, namespace),
            relative: relative.to_string(),
        })
    }

    pub fn container_name(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.purpose.as_str(),
            self.matrix,
            self.namespace.universe,
            self.namespace.namespace
        )
    }

    /// Full `container/relative` path for blob service calls
    pub fn blob_path(&self) -> String {
        format!("{}/{}", self.container_name(), self.relative)
    }
}

/// Database entry describing one collectible blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub path: BlobPath,
    pub size: u64,
    pub last_access: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subject_content() {
        let path = BlobPath::parse_subject(
            "/blobServices/default/containers/content-m1-prod-default/blobs/ab/cdef0123",
        )
        .unwrap();
        assert_eq!(path.purpose, ContainerPurpose::Content);
        assert_eq!(path.matrix, "m1");
        assert_eq!(path.namespace, NamespaceId::new("prod", "default"));
        assert_eq!(path.relative, "ab/cdef0123");
    }

    #[test]
    fn test_parse_subject_metadata() {
        let path = BlobPath::parse_subject(
            "/blobServices/default/containers/metadata-m2-u-team-cache/blobs/sel/1",
        )
        .unwrap();
        assert_eq!(path.purpose, ContainerPurpose::Metadata);
        // Namespace segment may contain dashes
        assert_eq!(path.namespace, NamespaceId::new("u", "team-cache"));
    }

    #[test]
    fn test_container_name_round_trip() {
        let subject = "/blobServices/default/containers/checkpoint-m1-u-n/blobs/state";
        let path = BlobPath::parse_subject(subject).unwrap();
        assert_eq!(path.container_name(), "checkpoint-m1-u-n");
        assert_eq!(path.blob_path(), "checkpoint-m1-u-n/state");
    }

    #[test]
    fn test_parse_subject_wrong_prefix() {
        let err = BlobPath::parse_subject("/queues/default/messages/1").unwrap_err();
        assert!(matches!(err, GcError::Parse(_)));
    }

    #[test]
    fn test_parse_subject_missing_blob_segment() {
        let err =
            BlobPath::parse_subject("/blobServices/default/containers/content-m1-u-n").unwrap_err();
        assert!(matches!(err, GcError::Parse(_)));
    }

    #[test]
    fn test_parse_subject_unknown_purpose() {
        let err = BlobPath::parse_subject(
            "/blobServices/default/containers/journal-m1-u-n/blobs/x",
        )
        .unwrap_err();
        assert!(matches!(err, GcError::Parse(_)));
    }

    #[test]
    fn test_parse_subject_short_container_name() {
        let err = BlobPath::parse_subject(
            "/blobServices/default/containers/content-m1/blobs/x",
        )
        .unwrap_err();
        assert!(matches!(err, GcError::Parse(_)));
    }

    #[test]
    fn test_namespace_display() {
        assert_eq!(NamespaceId::new("u", "n").to_string(), "u/n");
    }

    #[test]
    fn test_content_record_serialization() {
        let record = ContentRecord {
            path: BlobPath::parse_subject(
                "/blobServices/default/containers/content-m1-u-n/blobs/ab/cd",
            )
            .unwrap(),
            size: 100,
            last_access: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ContentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
