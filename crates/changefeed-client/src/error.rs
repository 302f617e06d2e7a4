//! Error types for the change feed client

use std::fmt;

#[derive(Debug)]
pub enum ChangeFeedError {
    /// Network or provider-side failure worth retrying on a later run
    Transient(String),
    /// Malformed continuation token or page payload
    Parse(String),
}

impl fmt::Display for ChangeFeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeFeedError::Transient(msg) => write!(f, "Transient feed error: {}", msg),
            ChangeFeedError::Parse(msg) => write!(f, "Feed parse error: {}", msg),
        }
    }
}

impl std::error::Error for ChangeFeedError {}

pub type Result<T> = std::result::Result<T, ChangeFeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_error_display() {
        let err = ChangeFeedError::Transient("connection reset".to_string());
        assert_eq!(format!("{}", err), "Transient feed error: connection reset");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ChangeFeedError::Parse("bad token".to_string());
        assert_eq!(format!("{}", err), "Feed parse error: bad token");
    }

    #[test]
    fn test_error_is_debug() {
        let err = ChangeFeedError::Parse("x".to_string());
        assert!(format!("{:?}", err).contains("Parse"));
    }
}
