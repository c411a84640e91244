//! Review configuration — consensus policy selection and round limits.

use serde::{Deserialize, Serialize};

use crate::consensus::RoleWeights;
use crate::error::{ReviewError, ReviewResult};

/// Aggregation policy used to collapse the vote ledger into one verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMethod {
    /// Strict majority of voters.
    Majority,
    /// Every voter must agree.
    Unanimous,
    /// Confidence × role weight, normalized.
    Weighted,
    /// A confident security rejection wins outright; otherwise weighted.
    #[default]
    SecurityVeto,
}

impl ConsensusMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Majority => "majority",
            Self::Unanimous => "unanimous",
            Self::Weighted => "weighted",
            Self::SecurityVeto => "security_veto",
        }
    }
}

impl std::fmt::Display for ConsensusMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsensusMethod {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "majority" => Ok(Self::Majority),
            "unanimous" => Ok(Self::Unanimous),
            "weighted" => Ok(Self::Weighted),
            "security_veto" => Ok(Self::SecurityVeto),
            other => Err(ReviewError::UnknownConsensusMethod(other.to_string())),
        }
    }
}

/// Default number of discussion rounds.
pub const DEFAULT_MAX_ROUNDS: u32 = 3;

/// Configuration for one review council.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Aggregation policy.
    pub consensus_method: ConsensusMethod,
    /// Maximum discussion rounds (minimum 1).
    pub max_rounds: u32,
    /// Per-reviewer vote multipliers.
    pub role_weights: RoleWeights,
    /// Run Phase-1 analyses concurrently. Transcript order is unaffected.
    pub parallel_analysis: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            consensus_method: ConsensusMethod::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            role_weights: RoleWeights::default(),
            parallel_analysis: false,
        }
    }
}

impl ReviewConfig {
    pub fn with_method(mut self, method: ConsensusMethod) -> Self {
        self.consensus_method = method;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_role_weights(mut self, role_weights: RoleWeights) -> Self {
        self.role_weights = role_weights;
        self
    }

    pub fn with_parallel_analysis(mut self, enabled: bool) -> Self {
        self.parallel_analysis = enabled;
        self
    }

    /// Reject configurations that cannot drive a review.
    pub fn validate(&self) -> ReviewResult<()> {
        if self.max_rounds < 1 {
            return Err(ReviewError::InvalidMaxRounds(self.max_rounds));
        }
        self.role_weights.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReviewConfig::default();
        assert_eq!(config.consensus_method, ConsensusMethod::SecurityVeto);
        assert_eq!(config.max_rounds, 3);
        assert!(!config.parallel_analysis);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(
            "majority".parse::<ConsensusMethod>().unwrap(),
            ConsensusMethod::Majority
        );
        assert_eq!(
            " Security_Veto ".parse::<ConsensusMethod>().unwrap(),
            ConsensusMethod::SecurityVeto
        );
        let err = "plurality".parse::<ConsensusMethod>().unwrap_err();
        assert!(matches!(err, ReviewError::UnknownConsensusMethod(ref m) if m == "plurality"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_method_display_roundtrip() {
        for method in [
            ConsensusMethod::Majority,
            ConsensusMethod::Unanimous,
            ConsensusMethod::Weighted,
            ConsensusMethod::SecurityVeto,
        ] {
            assert_eq!(method.to_string().parse::<ConsensusMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let err = ReviewConfig::default().with_max_rounds(0).validate().unwrap_err();
        assert!(matches!(err, ReviewError::InvalidMaxRounds(0)));
    }

    #[test]
    fn test_negative_role_weight_rejected() {
        let config = ReviewConfig::default()
            .with_method(ConsensusMethod::Weighted)
            .with_role_weights(RoleWeights::uniform(1.0).with_weight("a", -1.0));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ReviewError::InvalidRoleWeight { ref agent, .. } if agent == "a"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ReviewConfig =
            serde_json::from_str(r#"{"consensus_method":"weighted"}"#).unwrap();
        assert_eq!(config.consensus_method, ConsensusMethod::Weighted);
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(config.role_weights, RoleWeights::default());
    }
}
