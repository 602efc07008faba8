//! Error types for the rules crate.

use ecoroute_core::error::Error as CoreError;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Insufficient data: {classes} outcome class(es) in {samples} usable row(s), need 2 classes")]
    InsufficientData { classes: usize, samples: usize },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

impl From<serde_json::Error> for RuleError {
    fn from(e: serde_json::Error) -> Self {
        RuleError::Serialization(e.to_string())
    }
}

impl From<RuleError> for CoreError {
    fn from(e: RuleError) -> Self {
        match e {
            RuleError::InsufficientData { .. } => CoreError::Validation(e.to_string()),
            RuleError::Validation(s) => CoreError::Validation(s),
            RuleError::Training(s) => CoreError::Internal(s),
            RuleError::Io(e) => CoreError::Storage(e.to_string()),
            RuleError::Serialization(s) => CoreError::Serialization(s),
        }
    }
}
