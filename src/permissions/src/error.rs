//! Error types for template matching and scope resolution

use thiserror::Error;

/// Permission resolution errors
#[derive(Debug, Error)]
pub enum PermissionsError {
    /// The permission index was never built successfully or holds no entries
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid caller input (empty url, unsupported scope type, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A url matched no registered template
    #[error("Not found: {0}")]
    NotFound(String),

    /// Dataset document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Template key registered twice in the same table
    #[error("Duplicate template key: {0}")]
    DuplicateKey(String),

    /// Template text is empty or malformed
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Template key is empty
    #[error("Invalid template key: {0}")]
    InvalidKey(String),

    /// Content provider failed to supply a document
    #[error("Content error: {0}")]
    Content(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PermissionsError {
    fn from(err: serde_json::Error) -> Self {
        PermissionsError::Parse(err.to_string())
    }
}

/// Result type for permission operations
pub type Result<T> = std::result::Result<T, PermissionsError>;
