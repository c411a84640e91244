//! Consensus Manager — vote ledger, round accounting and policy dispatch.
//!
//! # Policies
//!
//! ```text
//! majority       count(v) > N/2                 → v, else NEEDS_DISCUSSION
//! unanimous      all votes identical            → v, else NEEDS_DISCUSSION
//! weighted       argmax Σ(conf × role_weight)   → reached iff score > 0.5
//! security_veto  SecurityAuditor REJECT ≥ 0.7   → REJECT, else weighted
//! ```

pub mod ledger;
pub mod policy;
pub mod weights;

pub use ledger::{AgentVote, VoteLedger};
pub use policy::{
    ConsensusResult, VerdictScores, SCORE_TIE_EPSILON, TIE_BREAK_PRIORITY,
    VETO_CONFIDENCE_THRESHOLD, WEIGHTED_CONSENSUS_THRESHOLD,
};
pub use weights::{RoleWeights, CODE_QUALITY_REVIEWER, RULE_COMPLIANCE_VERIFIER, SECURITY_AUDITOR};

use tracing::debug;

use crate::config::{ConsensusMethod, ReviewConfig, DEFAULT_MAX_ROUNDS};
use crate::types::{clamp_confidence, Verdict};

/// Owns the vote ledger and turns it into a [`ConsensusResult`].
#[derive(Debug, Clone)]
pub struct ConsensusManager {
    method: ConsensusMethod,
    ledger: VoteLedger,
    rounds: u32,
    max_rounds: u32,
    role_weights: RoleWeights,
}

impl ConsensusManager {
    /// Create a manager with the standard role weights and round limit.
    pub fn new(method: ConsensusMethod) -> Self {
        Self {
            method,
            ledger: VoteLedger::new(),
            rounds: 0,
            max_rounds: DEFAULT_MAX_ROUNDS,
            role_weights: RoleWeights::default(),
        }
    }

    /// Create a manager from a review configuration.
    pub fn with_config(config: &ReviewConfig) -> Self {
        Self {
            method: config.consensus_method,
            ledger: VoteLedger::new(),
            rounds: 0,
            max_rounds: config.max_rounds,
            role_weights: config.role_weights.clone(),
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_role_weights(mut self, role_weights: RoleWeights) -> Self {
        self.role_weights = role_weights;
        self
    }

    pub fn method(&self) -> ConsensusMethod {
        self.method
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn votes(&self) -> &VoteLedger {
        &self.ledger
    }

    /// Record `agent_name`'s vote, replacing any earlier one.
    ///
    /// Confidence is clamped to `[0, 1]`; the role weight comes from the
    /// configured table.
    pub fn add_vote(&mut self, agent_name: &str, verdict: Verdict, confidence: f64, rationale: &str) {
        let vote = AgentVote {
            agent_name: agent_name.to_string(),
            verdict,
            confidence: clamp_confidence(confidence),
            role_weight: self.role_weights.weight_for(agent_name),
            rationale: rationale.to_string(),
        };
        debug!(
            agent = agent_name,
            verdict = %vote.verdict,
            confidence = vote.confidence,
            role_weight = vote.role_weight,
            "Recording vote"
        );
        if let Some(previous) = self.ledger.upsert(vote) {
            debug!(agent = agent_name, previous = %previous.verdict, "Replaced earlier vote");
        }
    }

    /// Compute the decision from the current ledger.
    pub fn calculate_consensus(&self) -> ConsensusResult {
        policy::evaluate(self.method, &self.ledger, self.rounds)
    }

    /// Normalized weighted scores for the current ledger.
    pub fn weighted_scores(&self) -> VerdictScores {
        VerdictScores::from_ledger(&self.ledger)
    }

    pub fn increment_round(&mut self) {
        self.rounds += 1;
    }

    /// Whether another discussion round should run.
    ///
    /// False once the round limit is hit or the policy reports consensus.
    pub fn should_continue(&self) -> bool {
        if self.rounds >= self.max_rounds {
            return false;
        }
        !self.calculate_consensus().consensus_reached
    }

    /// Clear votes and rounds for a new review.
    pub fn reset(&mut self) {
        self.ledger.clear();
        self.rounds = 0;
    }
}

impl Default for ConsensusManager {
    fn default() -> Self {
        Self::new(ConsensusMethod::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger() {
        let manager = ConsensusManager::new(ConsensusMethod::Majority);
        let result = manager.calculate_consensus();
        assert_eq!(result.final_verdict, Verdict::NeedsDiscussion);
        assert!(!result.consensus_reached);
        assert_eq!(result.total_confidence, 0.0);
        assert_eq!(result.summary, "No votes received");
        assert!(result.vote_breakdown.is_empty());
    }

    #[test]
    fn test_add_vote_uses_role_weight_and_clamps() {
        let mut manager = ConsensusManager::default();
        manager.add_vote(SECURITY_AUDITOR, Verdict::Reject, 1.4, "eval()");
        manager.add_vote("Unknown", Verdict::Approve, -3.0, "");

        let security = manager.votes().get(SECURITY_AUDITOR).unwrap();
        assert_eq!(security.role_weight, 1.5);
        assert_eq!(security.confidence, 1.0);

        let unknown = manager.votes().get("Unknown").unwrap();
        assert_eq!(unknown.role_weight, 1.0);
        assert_eq!(unknown.confidence, 0.0);
    }

    #[test]
    fn test_add_vote_latest_wins() {
        let mut manager = ConsensusManager::new(ConsensusMethod::Majority);
        manager.add_vote("a", Verdict::Approve, 0.9, "first");
        manager.add_vote("b", Verdict::Approve, 0.9, "");
        manager.add_vote("a", Verdict::Reject, 0.4, "second");

        assert_eq!(manager.votes().len(), 2);
        let a = manager.votes().get("a").unwrap();
        assert_eq!(a.verdict, Verdict::Reject);
        assert_eq!(a.confidence, 0.4);
        assert_eq!(a.rationale, "second");

        let result = manager.calculate_consensus();
        let keys: Vec<&str> = result.vote_breakdown.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_should_continue_stops_at_max_rounds() {
        let mut manager = ConsensusManager::new(ConsensusMethod::Unanimous).with_max_rounds(2);
        manager.add_vote("a", Verdict::Approve, 0.9, "");
        manager.add_vote("b", Verdict::Reject, 0.9, "");
        assert!(manager.should_continue());
        manager.increment_round();
        assert!(manager.should_continue());
        manager.increment_round();
        assert!(!manager.should_continue());
        assert_eq!(manager.calculate_consensus().rounds_taken, 2);
    }

    #[test]
    fn test_should_continue_stops_on_consensus() {
        let mut manager = ConsensusManager::new(ConsensusMethod::Unanimous);
        manager.add_vote("a", Verdict::Approve, 0.9, "");
        assert!(!manager.should_continue());
    }

    #[test]
    fn test_reset() {
        let mut manager = ConsensusManager::default();
        manager.add_vote("a", Verdict::Approve, 0.9, "");
        manager.increment_round();
        manager.reset();
        assert!(manager.votes().is_empty());
        assert_eq!(manager.rounds(), 0);
    }

    #[test]
    fn test_with_config() {
        let config = ReviewConfig::default()
            .with_method(ConsensusMethod::Weighted)
            .with_max_rounds(5)
            .with_role_weights(RoleWeights::uniform(2.0));
        let mut manager = ConsensusManager::with_config(&config);
        manager.add_vote(SECURITY_AUDITOR, Verdict::Approve, 0.5, "");
        assert_eq!(manager.method(), ConsensusMethod::Weighted);
        assert_eq!(manager.max_rounds(), 5);
        assert_eq!(manager.votes().get(SECURITY_AUDITOR).unwrap().role_weight, 2.0);
    }
}
