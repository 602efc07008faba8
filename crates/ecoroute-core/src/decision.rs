//! Where a task should run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution site chosen for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Run on the local device.
    Local,
    /// Offload to a remote compute node.
    Cloud,
}

impl Decision {
    /// Map an `offload_better` label to a decision.
    pub fn from_offload(offload_better: bool) -> Self {
        if offload_better {
            Decision::Cloud
        } else {
            Decision::Local
        }
    }

    pub fn is_offload(&self) -> bool {
        matches!(self, Decision::Cloud)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Local => f.write_str("local"),
            Decision::Cloud => f.write_str("cloud"),
        }
    }
}
