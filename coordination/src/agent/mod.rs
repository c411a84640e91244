//! Reviewer capability — the uniform interface every reviewer implements.
//!
//! The orchestrator never inspects a reviewer's concrete type. Identity for
//! role weights and the security veto comes from [`ReviewerAgent::name`].
//!
//! Implementations own their failure handling: when an internal collaborator
//! (an LLM call, say) fails, the reviewer answers with
//! [`CodeAnalysis::neutral`] and an advisory message instead of an error.

pub mod stub;

use async_trait::async_trait;

use crate::types::{CodeAnalysis, ReviewMessage};

pub use stub::ScriptedAgent;

/// A specialized reviewer taking part in the council.
#[async_trait]
pub trait ReviewerAgent: Send + Sync {
    /// Stable identity, unique within a roster.
    fn name(&self) -> &str;

    /// Short description of the reviewer's specialization.
    fn role(&self) -> &str {
        self.name()
    }

    /// System prompt for an LLM collaborator.
    fn system_prompt(&self) -> String;

    /// Independent first look at the submission.
    async fn analyze_code(&self, code: &str, filename: &str) -> CodeAnalysis;

    /// Contribute to the discussion.
    ///
    /// An empty `transcript` asks for an opening statement of the reviewer's
    /// own findings rather than a reply.
    async fn respond_to_discussion(
        &self,
        code: &str,
        transcript: &[ReviewMessage],
        my_analysis: &CodeAnalysis,
    ) -> ReviewMessage;
}

/// Most recent message in `transcript` not written by `agent_name`.
pub fn last_message_from_others<'a>(
    transcript: &'a [ReviewMessage],
    agent_name: &str,
) -> Option<&'a ReviewMessage> {
    transcript.iter().rev().find(|m| m.agent_name != agent_name)
}

/// Most recent message in `transcript` written by `agent_name`.
pub fn last_message_from<'a>(
    transcript: &'a [ReviewMessage],
    agent_name: &str,
) -> Option<&'a ReviewMessage> {
    transcript.iter().rev().find(|m| m.agent_name == agent_name)
}
