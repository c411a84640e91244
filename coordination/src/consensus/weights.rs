//! Per-reviewer multipliers for the weighted and veto policies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, ReviewResult};

/// Stable identity of the security reviewer (holder of the veto).
pub const SECURITY_AUDITOR: &str = "SecurityAuditor";
/// Stable identity of the rules-compliance reviewer.
pub const RULE_COMPLIANCE_VERIFIER: &str = "RuleComplianceVerifier";
/// Stable identity of the code-quality reviewer.
pub const CODE_QUALITY_REVIEWER: &str = "CodeQualityReviewer";

/// Lookup table from reviewer name to vote multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleWeights {
    /// Explicit weights keyed by reviewer name.
    pub weights: BTreeMap<String, f64>,
    /// Weight for reviewers absent from `weights`.
    pub default_weight: f64,
}

impl RoleWeights {
    /// A table with no explicit entries.
    pub fn uniform(default_weight: f64) -> Self {
        Self {
            weights: BTreeMap::new(),
            default_weight,
        }
    }

    /// Set or replace the weight for one reviewer.
    pub fn with_weight(mut self, agent_name: &str, weight: f64) -> Self {
        self.weights.insert(agent_name.to_string(), weight);
        self
    }

    /// Weight for `agent_name`, falling back to the default.
    pub fn weight_for(&self, agent_name: &str) -> f64 {
        self.weights
            .get(agent_name)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Every weight, the default included, must be finite and non-negative.
    pub fn validate(&self) -> ReviewResult<()> {
        let entries = self
            .weights
            .iter()
            .map(|(name, weight)| (name.as_str(), *weight))
            .chain(std::iter::once(("default_weight", self.default_weight)));
        for (agent, weight) in entries {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ReviewError::InvalidRoleWeight {
                    agent: agent.to_string(),
                    weight,
                });
            }
        }
        Ok(())
    }
}

impl Default for RoleWeights {
    fn default() -> Self {
        Self::uniform(1.0)
            .with_weight(SECURITY_AUDITOR, 1.5)
            .with_weight(RULE_COMPLIANCE_VERIFIER, 1.3)
            .with_weight(CODE_QUALITY_REVIEWER, 1.0)
    }
}
