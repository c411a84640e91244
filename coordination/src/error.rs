//! Error types for review coordination.
//!
//! Only configuration and internal-invariant failures surface here. Reviewer
//! failures are contained inside each agent and never reach the orchestrator.

use crate::conversation::ReviewPhase;

/// Errors raised by the review coordination layer.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("reviewer roster is empty")]
    EmptyRoster,

    #[error("duplicate reviewer name in roster: {0}")]
    DuplicateAgent(String),

    #[error(
        "unknown consensus method '{0}' (expected majority, unanimous, weighted or security_veto)"
    )]
    UnknownConsensusMethod(String),

    #[error("max_rounds must be at least 1, got {0}")]
    InvalidMaxRounds(u32),

    #[error("role weight for {agent} must be finite and non-negative, got {weight}")]
    InvalidRoleWeight { agent: String, weight: f64 },

    #[error("invalid phase transition {from} → {to}")]
    InvalidTransition { from: ReviewPhase, to: ReviewPhase },

    #[error("conversation log is already sealed")]
    LogSealed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReviewError {
    /// Whether this error stems from caller-supplied configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyRoster
                | Self::DuplicateAgent(_)
                | Self::UnknownConsensusMethod(_)
                | Self::InvalidMaxRounds(_)
                | Self::InvalidRoleWeight { .. }
        )
    }
}

/// Result type for review coordination operations.
pub type ReviewResult<T> = Result<T, ReviewError>;
