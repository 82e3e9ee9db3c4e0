//! Error types for mnemo.
//!
//! The variants follow the retrieval engine's failure taxonomy:
//!
//! | Variant | Meaning | Propagates out of Ask? |
//! |---------|---------|------------------------|
//! | `Config` | Missing credentials or unusable configuration | Only at top level |
//! | `Retrieval` | Branch-local network/timeout failure | No, degrades to other sources |
//! | `Provider` | LLM completion failed | Yes |
//! | `Parse` | LLM returned unusable structured output | No, deterministic fallback |
//!
//! Rate limiting is a deliberate delay and never surfaces as an error.

use thiserror::Error;

/// Result type alias using mnemo's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mnemo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// AI provider completion failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// A retrieval branch (vector, keyword, web) failed or timed out
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Structured model output could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// The target already exists (e.g. a document indexed twice)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Search cache backend failed
    #[error("Cache error: {0}")]
    Cache(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error must reach the caller instead of degrading to an
    /// empty contribution.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::Config(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Error::Retrieval(format!("deadline exceeded: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("todo 42".to_string());
        assert_eq!(err.to_string(), "Not found: todo 42");
    }

    #[test]
    fn test_error_display_provider() {
        let err = Error::Provider("anthropic returned 500".to_string());
        assert_eq!(err.to_string(), "Provider error: anthropic returned 500");
    }

    #[test]
    fn test_error_display_retrieval() {
        let err = Error::Retrieval("keyword index unavailable".to_string());
        assert_eq!(err.to_string(), "Retrieval error: keyword index unavailable");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_error_display_parse() {
        let err = Error::Parse("expected JSON array".to_string());
        assert_eq!(err.to_string(), "Parse error: expected JSON array");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Provider("x".into()).is_fatal());
        assert!(Error::Config("x".into()).is_fatal());
        assert!(!Error::Retrieval("x".into()).is_fatal());
        assert!(!Error::Parse("x".into()).is_fatal());
        assert!(!Error::Embedding("x".into()).is_fatal());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<Vec<String>>("not json").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
