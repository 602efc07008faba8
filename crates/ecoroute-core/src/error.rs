//! Unified error handling for EcoRoute.
//!
//! Every crate keeps its own error enum and converts into this one at the
//! crate boundary, so callers that span crates only deal with one type.

/// Unified error type for EcoRoute.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (negative runtimes, unknown feature names, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage/database errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Network-related errors.
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout errors.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Not found errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Parse errors with location context.
    #[error("Parse error at {location}: {message}")]
    Parse { location: String, message: String },
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Parse {
            location: "config".to_string(),
            message: e.to_string(),
        }
    }
}
