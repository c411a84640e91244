//! Review phase state machine — phases, transitions, and their history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, ReviewResult};

/// Phase of a single review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPhase {
    /// Review created but not started.
    Idle,
    /// Reviewers analyze the submission independently.
    Analysis,
    /// Reviewers exchange rounds of commentary.
    Discussion,
    /// The ledger is collapsed into a single verdict.
    Consensus,
    /// Result attached and the log closed.
    Sealed,
}

impl ReviewPhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sealed)
    }

    /// Valid transitions from this phase.
    ///
    /// `Analysis → Consensus` is the quick-review path that skips discussion.
    pub fn valid_transitions(self) -> &'static [ReviewPhase] {
        match self {
            Self::Idle => &[Self::Analysis],
            Self::Analysis => &[Self::Discussion, Self::Consensus],
            Self::Discussion => &[Self::Consensus],
            Self::Consensus => &[Self::Sealed],
            Self::Sealed => &[],
        }
    }
}

impl std::fmt::Display for ReviewPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Analysis => write!(f, "analysis"),
            Self::Discussion => write!(f, "discussion"),
            Self::Consensus => write!(f, "consensus"),
            Self::Sealed => write!(f, "sealed"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: ReviewPhase,
    pub to: ReviewPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Current phase plus the transitions that led to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTracker {
    phase: ReviewPhase,
    transitions: Vec<PhaseTransition>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: ReviewPhase::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn phase(&self) -> ReviewPhase {
        self.phase
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    /// Move to `to`, recording why.
    pub fn transition(&mut self, to: ReviewPhase, reason: &str) -> ReviewResult<()> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(ReviewError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;
        Ok(())
    }

    /// Start over from `Idle`, dropping history.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_review_path() {
        let mut tracker = PhaseTracker::new();
        tracker.transition(ReviewPhase::Analysis, "start").unwrap();
        tracker.transition(ReviewPhase::Discussion, "analyses done").unwrap();
        tracker.transition(ReviewPhase::Consensus, "rounds done").unwrap();
        tracker.transition(ReviewPhase::Sealed, "result attached").unwrap();

        assert!(tracker.phase().is_terminal());
        assert_eq!(tracker.transitions().len(), 4);
        assert_eq!(tracker.transitions()[0].from, ReviewPhase::Idle);
        assert_eq!(tracker.transitions()[3].reason, "result attached");
    }

    #[test]
    fn test_quick_path_skips_discussion() {
        let mut tracker = PhaseTracker::new();
        tracker.transition(ReviewPhase::Analysis, "quick").unwrap();
        tracker.transition(ReviewPhase::Consensus, "quick").unwrap();
        assert_eq!(tracker.phase(), ReviewPhase::Consensus);
    }

    #[test]
    fn test_invalid_transition() {
        let mut tracker = PhaseTracker::new();
        let err = tracker
            .transition(ReviewPhase::Discussion, "skip analysis")
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewError::InvalidTransition {
                from: ReviewPhase::Idle,
                to: ReviewPhase::Discussion
            }
        ));
        assert!(tracker.transitions().is_empty());
    }

    #[test]
    fn test_sealed_is_final() {
        assert!(ReviewPhase::Sealed.valid_transitions().is_empty());
        assert!(!ReviewPhase::Consensus.is_terminal());
    }

    #[test]
    fn test_reset() {
        let mut tracker = PhaseTracker::new();
        tracker.transition(ReviewPhase::Analysis, "start").unwrap();
        tracker.reset();
        assert_eq!(tracker.phase(), ReviewPhase::Idle);
        assert!(tracker.transitions().is_empty());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ReviewPhase::Idle.to_string(), "idle");
        assert_eq!(ReviewPhase::Analysis.to_string(), "analysis");
        assert_eq!(ReviewPhase::Discussion.to_string(), "discussion");
        assert_eq!(ReviewPhase::Consensus.to_string(), "consensus");
        assert_eq!(ReviewPhase::Sealed.to_string(), "sealed");
    }
}
