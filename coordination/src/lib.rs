//! Review Coordination Library
//!
//! A council of specialized reviewers decides whether a submitted program is
//! admitted. This library provides:
//! - Verdict primitives shared by every reviewer
//! - The `ReviewerAgent` capability implemented by concrete reviewers
//! - A consensus manager with four aggregation policies
//! - A conversation orchestrator running analysis, discussion and consensus
//! - A sealed conversation log with JSON and transcript renderings
//!
//! # Usage
//!
//! ```no_run
//! use review_coordination::{
//!     ConsensusMethod, ConversationOrchestrator, ReviewConfig, ReviewerAgent, ScriptedAgent,
//!     Verdict,
//! };
//!
//! # async fn run() -> review_coordination::ReviewResult<()> {
//! let agents: Vec<Box<dyn ReviewerAgent>> = vec![
//!     Box::new(ScriptedAgent::new("SecurityAuditor", Verdict::Approve, 0.8)),
//!     Box::new(ScriptedAgent::new("CodeQualityReviewer", Verdict::Approve, 0.7)),
//! ];
//! let config = ReviewConfig::default().with_method(ConsensusMethod::SecurityVeto);
//! let mut orchestrator = ConversationOrchestrator::new(agents, config)?;
//!
//! let log = orchestrator.review_code("print('hi')", "agent.py").await?;
//! println!("{}", log.render_transcript());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod agent;
pub mod config;
pub mod consensus;
pub mod conversation;
pub mod error;
pub mod types;

pub use agent::{ReviewerAgent, ScriptedAgent};
pub use config::{ConsensusMethod, ReviewConfig, DEFAULT_MAX_ROUNDS};
pub use consensus::{
    AgentVote, ConsensusManager, ConsensusResult, RoleWeights, VerdictScores, VoteLedger,
    CODE_QUALITY_REVIEWER, RULE_COMPLIANCE_VERIFIER, SECURITY_AUDITOR,
};
pub use conversation::{
    code_hash, ConversationLog, ConversationOrchestrator, PhaseTracker, PhaseTransition,
    ReviewPhase,
};
pub use error::{ReviewError, ReviewResult};
pub use types::{clamp_confidence, CodeAnalysis, ReviewMessage, Verdict};
