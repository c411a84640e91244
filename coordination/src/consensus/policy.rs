//! Aggregation policies — majority, unanimous, weighted and security veto.
//!
//! Every policy is a pure function of the current ledger. Nothing here looks
//! at vote history; replaying the same ledger always yields the same result.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ledger::VoteLedger;
use super::weights::SECURITY_AUDITOR;
use crate::config::ConsensusMethod;
use crate::types::Verdict;

/// Minimum security-reviewer confidence for a rejection to act as a veto.
pub const VETO_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Normalized score a weighted winner must exceed for consensus.
pub const WEIGHTED_CONSENSUS_THRESHOLD: f64 = 0.5;

/// Scores closer than this are treated as tied.
pub const SCORE_TIE_EPSILON: f64 = 1e-9;

/// Winner preference among tied weighted scores, most preferred first.
///
/// A tie never approves: undecided beats reject beats approve.
pub const TIE_BREAK_PRIORITY: [Verdict; 3] =
    [Verdict::NeedsDiscussion, Verdict::Reject, Verdict::Approve];

const DISSENT_RATIONALE_CHARS: usize = 100;

/// Final decision computed from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub final_verdict: Verdict,
    pub consensus_reached: bool,
    /// Reviewer → verdict, in ledger order.
    pub vote_breakdown: IndexMap<String, Verdict>,
    /// Reviewer → confidence, in ledger order.
    pub confidence_scores: IndexMap<String, f64>,
    pub total_confidence: f64,
    pub rounds_taken: u32,
    /// Reviewers disagreeing with the final verdict, in ledger order.
    pub dissenting_opinions: Vec<String>,
    /// Markdown summary of the decision.
    pub summary: String,
}

impl ConsensusResult {
    /// Result for a ledger with no votes.
    pub fn no_votes(rounds_taken: u32) -> Self {
        Self {
            final_verdict: Verdict::NeedsDiscussion,
            consensus_reached: false,
            vote_breakdown: IndexMap::new(),
            confidence_scores: IndexMap::new(),
            total_confidence: 0.0,
            rounds_taken,
            dissenting_opinions: Vec::new(),
            summary: "No votes received".to_string(),
        }
    }

    /// Whether the submission is admitted.
    pub fn is_accepted(&self) -> bool {
        self.final_verdict == Verdict::Approve
    }

    /// Undecided after discussion ran to its round limit.
    pub fn is_inconclusive(&self, max_rounds: u32) -> bool {
        self.final_verdict == Verdict::NeedsDiscussion
            && !self.consensus_reached
            && self.rounds_taken >= max_rounds
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] consensus={} | confidence {:.2} | {} rounds | {} dissenting",
            self.final_verdict,
            if self.consensus_reached { "yes" } else { "no" },
            self.total_confidence,
            self.rounds_taken,
            self.dissenting_opinions.len()
        )
    }
}

/// Normalized weighted score per verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictScores {
    pub approve: f64,
    pub reject: f64,
    pub needs_discussion: f64,
}

impl VerdictScores {
    /// Σ(confidence × role_weight) per verdict, divided by the grand total.
    ///
    /// All scores stay 0 when the total weight is 0.
    pub fn from_ledger(ledger: &VoteLedger) -> Self {
        let mut scores = Self::default();
        let mut total = 0.0;
        for vote in ledger.iter() {
            let weight = vote.weight();
            *scores.get_mut(vote.verdict) += weight;
            total += weight;
        }
        if total > 0.0 {
            scores.approve /= total;
            scores.reject /= total;
            scores.needs_discussion /= total;
        }
        scores
    }

    pub fn get(&self, verdict: Verdict) -> f64 {
        match verdict {
            Verdict::Approve => self.approve,
            Verdict::Reject => self.reject,
            Verdict::NeedsDiscussion => self.needs_discussion,
        }
    }

    fn get_mut(&mut self, verdict: Verdict) -> &mut f64 {
        match verdict {
            Verdict::Approve => &mut self.approve,
            Verdict::Reject => &mut self.reject,
            Verdict::NeedsDiscussion => &mut self.needs_discussion,
        }
    }

    pub fn sum(&self) -> f64 {
        self.approve + self.reject + self.needs_discussion
    }

    /// Highest-scoring verdict, ties resolved by [`TIE_BREAK_PRIORITY`].
    pub fn winner(&self) -> (Verdict, f64) {
        let max = Verdict::ALL
            .iter()
            .map(|v| self.get(*v))
            .fold(f64::MIN, f64::max);
        let winner = TIE_BREAK_PRIORITY
            .iter()
            .copied()
            .find(|v| max - self.get(*v) <= SCORE_TIE_EPSILON)
            .unwrap_or(Verdict::NeedsDiscussion);
        (winner, self.get(winner))
    }
}

/// Dispatch to the policy selected by `method`.
pub fn evaluate(method: ConsensusMethod, ledger: &VoteLedger, rounds: u32) -> ConsensusResult {
    if ledger.is_empty() {
        return ConsensusResult::no_votes(rounds);
    }
    match method {
        ConsensusMethod::Majority => majority(ledger, rounds),
        ConsensusMethod::Unanimous => unanimous(ledger, rounds),
        ConsensusMethod::Weighted => weighted(ledger, rounds, method),
        ConsensusMethod::SecurityVeto => security_veto(ledger, rounds),
    }
}

/// A verdict wins if more than half of all voters cast it.
///
/// A majority of `NEEDS_DISCUSSION` is still undecided: the verdict stands
/// but consensus is not reached.
fn majority(ledger: &VoteLedger, rounds: u32) -> ConsensusResult {
    let voters = ledger.len();
    let winner = Verdict::ALL
        .into_iter()
        .find(|v| ledger.count(*v) * 2 > voters);

    let final_verdict = winner.unwrap_or(Verdict::NeedsDiscussion);
    let consensus_reached = winner.is_some_and(|v| v != Verdict::NeedsDiscussion);

    let dissenting_opinions = ledger
        .iter()
        .filter(|v| v.verdict != final_verdict)
        .map(|v| {
            let rationale: String = v.rationale.chars().take(DISSENT_RATIONALE_CHARS).collect();
            format!("{}: {} ({}...)", v.agent_name, v.verdict, rationale)
        })
        .collect();

    ConsensusResult {
        final_verdict,
        consensus_reached,
        vote_breakdown: ledger.breakdown(),
        confidence_scores: ledger.confidences(),
        total_confidence: ledger.mean_confidence_for(final_verdict),
        rounds_taken: rounds,
        dissenting_opinions,
        summary: summarize(
            final_verdict,
            consensus_reached,
            ledger,
            rounds,
            ConsensusMethod::Majority,
        ),
    }
}

/// Consensus only when every vote is identical.
fn unanimous(ledger: &VoteLedger, rounds: u32) -> ConsensusResult {
    let first = ledger.iter().next().map(|v| v.verdict);
    let agreed = first.filter(|first| ledger.iter().all(|v| v.verdict == *first));

    let (final_verdict, consensus_reached, total_confidence, dissenting_opinions) = match agreed
    {
        Some(verdict) => {
            let mean =
                ledger.iter().map(|v| v.confidence).sum::<f64>() / ledger.len() as f64;
            (verdict, true, mean, Vec::new())
        }
        None => (
            Verdict::NeedsDiscussion,
            false,
            0.5,
            ledger
                .iter()
                .map(|v| format!("{}: {}", v.agent_name, v.verdict))
                .collect(),
        ),
    };

    ConsensusResult {
        final_verdict,
        consensus_reached,
        vote_breakdown: ledger.breakdown(),
        confidence_scores: ledger.confidences(),
        total_confidence,
        rounds_taken: rounds,
        dissenting_opinions,
        summary: summarize(
            final_verdict,
            consensus_reached,
            ledger,
            rounds,
            ConsensusMethod::Unanimous,
        ),
    }
}

/// Normalized confidence × role-weight scoring.
///
/// `reported_as` is the method named in the summary; the veto policy falls
/// through to this one and keeps its own name.
fn weighted(ledger: &VoteLedger, rounds: u32, reported_as: ConsensusMethod) -> ConsensusResult {
    let scores = VerdictScores::from_ledger(ledger);
    let (final_verdict, winning_score) = scores.winner();
    let consensus_reached = winning_score > WEIGHTED_CONSENSUS_THRESHOLD;

    let dissenting_opinions = ledger
        .iter()
        .filter(|v| v.verdict != final_verdict)
        .map(|v| format!("{}: {} (weight: {:.2})", v.agent_name, v.verdict, v.weight()))
        .collect();

    let mut summary = summarize(final_verdict, consensus_reached, ledger, rounds, reported_as);
    summary.push_str(&format!(
        "\nWeighted scores: APPROVE={:.2}, REJECT={:.2}",
        scores.approve, scores.reject
    ));

    ConsensusResult {
        final_verdict,
        consensus_reached,
        vote_breakdown: ledger.breakdown(),
        confidence_scores: ledger.confidences(),
        total_confidence: winning_score,
        rounds_taken: rounds,
        dissenting_opinions,
        summary,
    }
}

/// A confident security rejection decides alone; otherwise weighted.
fn security_veto(ledger: &VoteLedger, rounds: u32) -> ConsensusResult {
    let veto = ledger.get(SECURITY_AUDITOR).filter(|v| {
        v.verdict == Verdict::Reject && v.confidence >= VETO_CONFIDENCE_THRESHOLD
    });

    let Some(veto) = veto else {
        return weighted(ledger, rounds, ConsensusMethod::SecurityVeto);
    };

    let reason = if veto.rationale.is_empty() {
        "Security concerns identified"
    } else {
        veto.rationale.as_str()
    };

    ConsensusResult {
        final_verdict: Verdict::Reject,
        consensus_reached: true,
        vote_breakdown: ledger.breakdown(),
        confidence_scores: ledger.confidences(),
        total_confidence: veto.confidence,
        rounds_taken: rounds,
        dissenting_opinions: ledger
            .iter()
            .filter(|v| v.verdict != Verdict::Reject)
            .map(|v| format!("{}: {}", v.agent_name, v.verdict))
            .collect(),
        summary: format!("SECURITY VETO: {}", reason),
    }
}

fn summarize(
    final_verdict: Verdict,
    consensus_reached: bool,
    ledger: &VoteLedger,
    rounds: u32,
    method: ConsensusMethod,
) -> String {
    let mut lines = vec![
        format!(
            "## Consensus Decision: {} {}",
            final_verdict.marker(),
            final_verdict
        ),
        String::new(),
        format!(
            "**Consensus Reached:** {}",
            if consensus_reached { "Yes" } else { "No" }
        ),
        format!("**Rounds:** {}", rounds),
        format!("**Method:** {}", method),
        String::new(),
        "### Vote Breakdown:".to_string(),
    ];
    for vote in ledger.iter() {
        lines.push(format!(
            "- **{}**: {} {} (confidence: {:.0}%)",
            vote.agent_name,
            vote.verdict.marker(),
            vote.verdict,
            vote.confidence * 100.0
        ));
    }
    lines.join("\n")
}
