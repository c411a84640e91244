//! Review conversations: phase tracking, the orchestrator that drives
//! reviewers through them, and the sealed log each review produces.

pub mod log;
pub mod orchestrator;
pub mod phase;

pub use log::{code_hash, ConversationLog};
pub use orchestrator::ConversationOrchestrator;
pub use phase::{PhaseTracker, PhaseTransition, ReviewPhase};
