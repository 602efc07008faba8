//! Error types for the agent crate.

use ecoroute_core::EnergyError;
use ecoroute_core::error::Error as CoreError;
use ecoroute_rules::RuleError;

use crate::executor::ExecutionError;

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Training failed for a reason other than missing data.
    #[error("Retrain failed: {0}")]
    Retrain(String),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Storage(#[from] ecoroute_storage::Error),

    #[error(transparent)]
    Energy(#[from] EnergyError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// True when training was skipped for lack of two outcome classes.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, AgentError::Rules(RuleError::InsufficientData { .. }))
    }
}

impl From<AgentError> for CoreError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Retrain(s) => CoreError::Internal(s),
            AgentError::Rules(e) => e.into(),
            AgentError::Storage(e) => e.into(),
            AgentError::Energy(e) => e.into(),
            AgentError::Execution(e) => CoreError::Network(e.to_string()),
            AgentError::UnknownCandidate(s) => CoreError::NotFound(s),
            AgentError::Io(e) => CoreError::Storage(e.to_string()),
        }
    }
}
