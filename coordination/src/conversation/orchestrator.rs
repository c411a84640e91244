//! Conversation orchestrator — drives reviewers through the review phases.
//!
//! ```text
//! Idle → Analysis ──────────→ Discussion ──→ Consensus → Sealed
//!          │  analyze_code       │  round k: every reviewer, in roster
//!          │  opening statement  │  order, sees the transcript including
//!          │  initial vote       │  earlier same-round replies
//!          │                     │  stop: rounds == max or consensus
//!          └─ quick_review ──────┴─────────→ Consensus (no transcript)
//! ```
//!
//! All ledger and log writes go through `&mut self`, so one review has a
//! single writer even when Phase-1 analyses run concurrently.

use std::collections::HashSet;

use futures::future::join_all;
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use super::log::ConversationLog;
use super::phase::{PhaseTracker, PhaseTransition, ReviewPhase};
use crate::agent::ReviewerAgent;
use crate::config::ReviewConfig;
use crate::consensus::{ConsensusManager, ConsensusResult};
use crate::error::{ReviewError, ReviewResult};
use crate::types::{CodeAnalysis, ReviewMessage, Verdict};

/// Characters of a discussion message kept as the vote rationale.
const DISCUSSION_RATIONALE_CHARS: usize = 200;

/// Runs one review at a time over a fixed, ordered roster of reviewers.
pub struct ConversationOrchestrator {
    agents: Vec<Box<dyn ReviewerAgent>>,
    config: ReviewConfig,
    consensus: ConsensusManager,
    phases: PhaseTracker,
}

impl ConversationOrchestrator {
    /// Create an orchestrator over `agents` in the given order.
    ///
    /// Fails before any review runs if the roster is empty, a reviewer name
    /// repeats, or the configuration is invalid.
    pub fn new(agents: Vec<Box<dyn ReviewerAgent>>, config: ReviewConfig) -> ReviewResult<Self> {
        config.validate()?;
        if agents.is_empty() {
            return Err(ReviewError::EmptyRoster);
        }
        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.name()) {
                return Err(ReviewError::DuplicateAgent(agent.name().to_string()));
            }
        }

        Ok(Self {
            consensus: ConsensusManager::with_config(&config),
            agents,
            config,
            phases: PhaseTracker::new(),
        })
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Reviewer names in registration order.
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// Ledger state as left by the most recent review.
    pub fn consensus(&self) -> &ConsensusManager {
        &self.consensus
    }

    pub fn phase(&self) -> ReviewPhase {
        self.phases.phase()
    }

    /// Phase transitions of the most recent review.
    pub fn transitions(&self) -> &[PhaseTransition] {
        self.phases.transitions()
    }

    /// Run a full review: analysis, discussion rounds, final consensus.
    ///
    /// Always returns a sealed log; reviewer degradation shows up as
    /// low-confidence votes, never as an error.
    #[instrument(skip(self, code), fields(method = %self.config.consensus_method, agents = self.agents.len()))]
    pub async fn review_code(&mut self, code: &str, filename: &str) -> ReviewResult<ConversationLog> {
        let mut log = ConversationLog::new(code, filename);
        self.consensus.reset();
        self.phases.reset();

        info!(code_hash = %log.code_hash, "Starting review");

        // Phase 1: independent analysis
        self.phases
            .transition(ReviewPhase::Analysis, "review started")?;
        let analyses = self.collect_analyses(code, filename).await;

        for (agent, analysis) in self.agents.iter().zip(analyses) {
            let name = agent.name();
            let opening = agent.respond_to_discussion(code, &[], &analysis).await;
            log.push_message(attribute(opening, name))?;

            self.consensus
                .add_vote(name, analysis.verdict, analysis.confidence, &analysis.rationale());
            info!(
                agent = name,
                verdict = %analysis.verdict,
                issues = analysis.issues.len(),
                warnings = analysis.warnings.len(),
                "Initial analysis"
            );
            log.record_analysis(name, analysis)?;
        }

        // Phase 2: discussion
        self.phases
            .transition(ReviewPhase::Discussion, "independent analyses recorded")?;
        let mut round = 0;
        while self.consensus.should_continue() && round < self.consensus.max_rounds() {
            round += 1;
            self.consensus.increment_round();
            debug!(round, "Discussion round");

            for agent in &self.agents {
                let name = agent.name();
                let Some(analysis) = log.analyses().get(name) else {
                    continue;
                };
                let confidence = analysis.confidence;
                let reply = agent
                    .respond_to_discussion(code, log.messages(), analysis)
                    .await;
                let reply = attribute(reply, name);

                if let Some(verdict) = reply.verdict {
                    self.consensus.add_vote(
                        name,
                        verdict,
                        confidence,
                        &reply.excerpt(DISCUSSION_RATIONALE_CHARS),
                    );
                }
                debug!(
                    agent = name,
                    round,
                    verdict = ?reply.verdict,
                    in_reply_to = ?reply.in_reply_to,
                    "Discussion reply"
                );
                log.push_message(reply)?;
            }
        }

        // Phase 3: final consensus
        self.phases.transition(
            ReviewPhase::Consensus,
            &format!("discussion ended after {} rounds", round),
        )?;
        let result = self.consensus.calculate_consensus();
        info!(
            verdict = %result.final_verdict,
            consensus_reached = result.consensus_reached,
            rounds = result.rounds_taken,
            total_confidence = result.total_confidence,
            "Review complete"
        );
        if result.is_inconclusive(self.consensus.max_rounds()) {
            warn!(code_hash = %log.code_hash, "Review inconclusive after exhausting rounds");
        }

        log.seal(result)?;
        self.phases
            .transition(ReviewPhase::Sealed, "consensus attached")?;
        Ok(log)
    }

    /// Analyze and vote once per reviewer, then decide. No transcript.
    #[instrument(skip(self, code), fields(method = %self.config.consensus_method))]
    pub async fn quick_review(&mut self, code: &str, filename: &str) -> ReviewResult<ConsensusResult> {
        self.consensus.reset();
        self.phases.reset();
        self.phases.transition(ReviewPhase::Analysis, "quick review")?;

        let analyses = self.collect_analyses(code, filename).await;
        for (agent, analysis) in self.agents.iter().zip(analyses) {
            self.consensus.add_vote(
                agent.name(),
                analysis.verdict,
                analysis.confidence,
                &analysis.rationale(),
            );
        }

        self.phases
            .transition(ReviewPhase::Consensus, "quick review votes recorded")?;
        let result = self.consensus.calculate_consensus();
        info!(verdict = %result.final_verdict, consensus_reached = result.consensus_reached, "Quick review complete");
        Ok(result)
    }

    /// Phase-1 analyses in roster order, sanitized.
    async fn collect_analyses(&self, code: &str, filename: &str) -> Vec<CodeAnalysis> {
        let analyses = if self.config.parallel_analysis {
            join_all(self.agents.iter().map(|a| a.analyze_code(code, filename))).await
        } else {
            let mut analyses = Vec::with_capacity(self.agents.len());
            for agent in &self.agents {
                analyses.push(agent.analyze_code(code, filename).await);
            }
            analyses
        };
        analyses.into_iter().map(CodeAnalysis::sanitized).collect()
    }

    /// Snapshot of the reviewer → verdict map currently in the ledger.
    pub fn current_votes(&self) -> IndexMap<String, Verdict> {
        self.consensus.votes().breakdown()
    }
}

/// Force a message's author to the reviewer that produced it.
fn attribute(mut message: ReviewMessage, agent_name: &str) -> ReviewMessage {
    if message.agent_name != agent_name {
        warn!(
            agent = agent_name,
            claimed = %message.agent_name,
            "Reviewer emitted a message under another name; reattributing"
        );
        message.agent_name = agent_name.to_string();
    }
    message
}
