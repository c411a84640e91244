//! Consensus property tests — policy invariants checked across generated
//! vote ledgers.
//!
//! Tests verify:
//! - A majority winner always holds more than half of the votes
//! - Unanimous agreement always reaches consensus on that verdict
//! - Weighted scores sum to 1.0 whenever total weight is positive
//! - A confident security rejection always wins under the veto policy
//! - Re-voting replaces a reviewer's entry without growing the ledger
//! - Discussion stops at the round limit even without consensus

use review_coordination::{
    ConsensusManager, ConsensusMethod, RoleWeights, Verdict, SECURITY_AUDITOR,
};

const METHODS: [ConsensusMethod; 4] = [
    ConsensusMethod::Majority,
    ConsensusMethod::Unanimous,
    ConsensusMethod::Weighted,
    ConsensusMethod::SecurityVeto,
];

/// Deterministic pseudo-random vote sets: every combination of verdicts for
/// `voters` reviewers, with confidences derived from the combination index.
fn ledgers(voters: usize) -> Vec<Vec<(String, Verdict, f64)>> {
    let combos = 3usize.pow(voters as u32);
    (0..combos)
        .map(|mut seed| {
            (0..voters)
                .map(|i| {
                    let verdict = Verdict::ALL[seed % 3];
                    seed /= 3;
                    let confidence = ((i * 37 + combos) % 11) as f64 / 10.0;
                    (format!("agent-{}", i), verdict, confidence)
                })
                .collect()
        })
        .collect()
}

fn manager_with(method: ConsensusMethod, votes: &[(String, Verdict, f64)]) -> ConsensusManager {
    let mut manager = ConsensusManager::new(method);
    for (name, verdict, confidence) in votes {
        manager.add_vote(name, *verdict, *confidence, "");
    }
    manager
}

// ── Property: majority winner holds > N/2 ──────────────────────────

#[test]
fn prop_majority_winner_is_strict() {
    for voters in 1..=5 {
        for votes in ledgers(voters) {
            let result = manager_with(ConsensusMethod::Majority, &votes).calculate_consensus();
            let count = votes
                .iter()
                .filter(|(_, v, _)| *v == result.final_verdict)
                .count();

            if result.consensus_reached {
                assert!(
                    count * 2 > voters,
                    "voters={}: winner {} has only {} votes",
                    voters,
                    result.final_verdict,
                    count
                );
                assert_ne!(result.final_verdict, Verdict::NeedsDiscussion);
            } else {
                assert_eq!(result.final_verdict, Verdict::NeedsDiscussion);
            }
        }
    }
}

// ── Property: identical votes are unanimous ────────────────────────

#[test]
fn prop_unanimous_agreement_reaches_consensus() {
    for voters in 1..=6 {
        for verdict in Verdict::ALL {
            let votes: Vec<_> = (0..voters)
                .map(|i| (format!("agent-{}", i), verdict, 0.1 * i as f64))
                .collect();
            let result = manager_with(ConsensusMethod::Unanimous, &votes).calculate_consensus();
            assert!(result.consensus_reached, "voters={} verdict={}", voters, verdict);
            assert_eq!(result.final_verdict, verdict);
            assert!(result.dissenting_opinions.is_empty());
        }
    }
}

// ── Property: weighted scores are normalized ───────────────────────

#[test]
fn prop_weighted_scores_sum_to_one() {
    for voters in 1..=5 {
        for votes in ledgers(voters) {
            let manager = manager_with(ConsensusMethod::Weighted, &votes);
            let total: f64 = votes.iter().map(|(_, _, c)| c).sum();
            let scores = manager.weighted_scores();

            if total > 0.0 {
                assert!(
                    (scores.sum() - 1.0).abs() < 1e-9,
                    "voters={}: scores sum to {}",
                    voters,
                    scores.sum()
                );
                let result = manager.calculate_consensus();
                assert_eq!(result.total_confidence, scores.get(result.final_verdict));
                assert_eq!(result.consensus_reached, result.total_confidence > 0.5);
            } else {
                assert_eq!(scores.sum(), 0.0);
            }
        }
    }
}

// ── Property: confident security rejection always wins ─────────────

#[test]
fn prop_security_veto_is_absolute() {
    for voters in 0..=4 {
        for votes in ledgers(voters) {
            for confidence in [0.7, 0.85, 1.0] {
                let mut manager = manager_with(ConsensusMethod::SecurityVeto, &votes);
                manager.add_vote(SECURITY_AUDITOR, Verdict::Reject, confidence, "exec()");

                let result = manager.calculate_consensus();
                assert_eq!(result.final_verdict, Verdict::Reject);
                assert!(result.consensus_reached);
                assert_eq!(result.total_confidence, confidence);

                let dissenters = votes.iter().filter(|(_, v, _)| *v != Verdict::Reject).count();
                assert_eq!(result.dissenting_opinions.len(), dissenters);
            }
        }
    }
}

#[test]
fn prop_weak_security_rejection_is_just_a_vote() {
    for confidence in [0.0, 0.3, 0.69] {
        let mut manager = ConsensusManager::new(ConsensusMethod::SecurityVeto)
            .with_role_weights(RoleWeights::default());
        manager.add_vote("a", Verdict::Approve, 0.9, "");
        manager.add_vote("b", Verdict::Approve, 0.9, "");
        manager.add_vote(SECURITY_AUDITOR, Verdict::Reject, confidence, "");

        let result = manager.calculate_consensus();
        assert_eq!(result.final_verdict, Verdict::Approve, "confidence={}", confidence);
        assert!(!result.summary.starts_with("SECURITY VETO"));
    }
}

// ── Property: same-agent replacement is idempotent ─────────────────

#[test]
fn prop_add_vote_replaces_in_place() {
    for method in METHODS {
        let mut manager = ConsensusManager::new(method);
        for round in 0..5 {
            for verdict in Verdict::ALL {
                manager.add_vote("a", verdict, 0.1 * round as f64, "first");
                manager.add_vote("b", verdict, 0.5, "second");
                manager.add_vote("a", verdict, 0.9, "latest");

                assert_eq!(manager.votes().len(), 2);
                let vote = manager.votes().get("a").unwrap();
                assert_eq!(vote.verdict, verdict);
                assert_eq!(vote.confidence, 0.9);
                assert_eq!(vote.rationale, "latest");
            }
        }
    }
}

// ── Property: round limit always terminates discussion ─────────────

#[test]
fn prop_should_continue_false_at_round_limit() {
    for method in METHODS {
        for max_rounds in 1..=4 {
            let mut manager = ConsensusManager::new(method).with_max_rounds(max_rounds);
            manager.add_vote("a", Verdict::Approve, 0.5, "");
            manager.add_vote("b", Verdict::Reject, 0.5, "");
            manager.add_vote("c", Verdict::NeedsDiscussion, 0.5, "");

            for _ in 0..max_rounds {
                assert!(manager.should_continue(), "method={} max={}", method, max_rounds);
                manager.increment_round();
            }
            assert!(!manager.should_continue(), "method={} max={}", method, max_rounds);
            assert_eq!(manager.calculate_consensus().rounds_taken, max_rounds);
        }
    }
}

// ── Property: evaluation is a pure function of the ledger ──────────

#[test]
fn prop_evaluation_is_repeatable() {
    for method in METHODS {
        for votes in ledgers(3) {
            let manager = manager_with(method, &votes);
            assert_eq!(manager.calculate_consensus(), manager.calculate_consensus());
        }
    }
}
