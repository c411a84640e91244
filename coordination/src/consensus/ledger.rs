//! The latest-wins vote ledger, kept in update order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::Verdict;

/// A reviewer's current vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentVote {
    /// Reviewer identity (ledger key).
    pub agent_name: String,
    pub verdict: Verdict,
    /// Confidence in the verdict (0.0–1.0).
    pub confidence: f64,
    /// Multiplier taken from the role-weight table at insertion time.
    pub role_weight: f64,
    /// Short justification for the vote.
    pub rationale: String,
}

impl AgentVote {
    /// Contribution of this vote to weighted scoring.
    pub fn weight(&self) -> f64 {
        self.confidence * self.role_weight
    }
}

/// Ordered map of reviewer name to vote.
///
/// Iteration follows insertion order, where replacing an existing vote
/// counts as a fresh insertion: the replaced vote moves to the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteLedger {
    votes: IndexMap<String, AgentVote>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the vote for `vote.agent_name`.
    ///
    /// Returns the vote it replaced, if any.
    pub fn upsert(&mut self, vote: AgentVote) -> Option<AgentVote> {
        let previous = self.votes.shift_remove(&vote.agent_name);
        self.votes.insert(vote.agent_name.clone(), vote);
        previous
    }

    pub fn get(&self, agent_name: &str) -> Option<&AgentVote> {
        self.votes.get(agent_name)
    }

    /// Votes in ledger order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentVote> {
        self.votes.values()
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }

    /// Reviewer name → verdict, in ledger order.
    pub fn breakdown(&self) -> IndexMap<String, Verdict> {
        self.iter()
            .map(|v| (v.agent_name.clone(), v.verdict))
            .collect()
    }

    /// Reviewer name → confidence, in ledger order.
    pub fn confidences(&self) -> IndexMap<String, f64> {
        self.iter()
            .map(|v| (v.agent_name.clone(), v.confidence))
            .collect()
    }

    /// Number of votes cast for `verdict`.
    pub fn count(&self, verdict: Verdict) -> usize {
        self.iter().filter(|v| v.verdict == verdict).count()
    }

    /// Mean confidence of the votes for `verdict`, or 0 when there are none.
    pub fn mean_confidence_for(&self, verdict: Verdict) -> f64 {
        let (sum, n) = self
            .iter()
            .filter(|v| v.verdict == verdict)
            .fold((0.0, 0usize), |(sum, n), v| (sum + v.confidence, n + 1));
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }
}
