//! Concrete reviewers.
//!
//! | Reviewer                 | Analysis                  | Discussion stance                    |
//! |--------------------------|---------------------------|--------------------------------------|
//! | `SecurityAuditor`        | regex obfuscation scan    | holds REJECT while issues remain     |
//! | `CodeQualityReviewer`    | readability/structure     | defers to a security REJECT          |
//! | `RuleComplianceVerifier` | LLM rules check           | any violation means REJECT           |
//!
//! Each reviewer optionally carries a [`ChatClient`]. LLM failures degrade to
//! the rule-based path and never leave the reviewer.

pub mod compliance;
pub mod quality;
pub mod security;

use std::sync::Arc;

use review_coordination::{CodeAnalysis, ReviewMessage, ReviewerAgent};
use tracing::warn;

use crate::llm::{ChatClient, ChatMessage};

pub use compliance::RuleComplianceVerifier;
pub use quality::CodeQualityReviewer;
pub use security::SecurityAuditor;

/// Transcript messages shown to the LLM when drafting a reply.
const LLM_CONTEXT_MESSAGES: usize = 5;

/// The standard council in canonical order: security, quality, compliance.
pub fn default_roster(client: Option<Arc<dyn ChatClient>>) -> Vec<Box<dyn ReviewerAgent>> {
    vec![
        Box::new(SecurityAuditor::new(client.clone())),
        Box::new(CodeQualityReviewer::new(client.clone())),
        Box::new(RuleComplianceVerifier::new(client)),
    ]
}

/// A titled list in an opening statement.
struct Section<'a> {
    title: &'a str,
    items: &'a [String],
    /// Show at most this many items, summarizing the rest.
    limit: Option<usize>,
}

impl<'a> Section<'a> {
    fn new(title: &'a str, items: &'a [String]) -> Self {
        Self {
            title,
            items,
            limit: None,
        }
    }

    fn limited(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Markdown opening statement: heading, non-empty sections, verdict.
fn opening_statement(heading: &str, sections: &[Section<'_>], analysis: &CodeAnalysis) -> String {
    let mut parts = vec![format!("{}\n", heading)];

    for section in sections.iter().filter(|s| !s.items.is_empty()) {
        parts.push(section.title.to_string());
        let shown = section.limit.unwrap_or(section.items.len());
        parts.extend(section.items.iter().take(shown).map(|item| format!("- {}", item)));
        if section.items.len() > shown {
            parts.push(format!("- ... and {} more", section.items.len() - shown));
        }
        parts.push(String::new());
    }

    parts.push(format!(
        "**Verdict:** {} {}",
        analysis.verdict.marker(),
        analysis.verdict
    ));
    parts.push(format!("**Confidence:** {:.0}%", analysis.confidence * 100.0));
    parts.join("\n")
}

/// The last few transcript messages, formatted for an LLM prompt.
fn recent_conversation(transcript: &[ReviewMessage]) -> String {
    let start = transcript.len().saturating_sub(LLM_CONTEXT_MESSAGES);
    transcript[start..]
        .iter()
        .map(|m| {
            let verdict = m.verdict.map(|v| v.as_str()).unwrap_or("N/A");
            format!("**{}** ({}):\n{}", m.agent_name, verdict, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Python-list-style rendering of findings for prompts and warnings.
fn bracketed(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{}'", i)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Ask the model for a discussion reply; `None` when the client fails.
async fn draft_reply(
    client: &dyn ChatClient,
    agent_name: &str,
    system_prompt: String,
    prompt: String,
) -> Option<String> {
    let messages = [ChatMessage::system(system_prompt), ChatMessage::user(prompt)];
    match client.chat(&messages).await {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(agent = agent_name, error = %e, "LLM reply failed, using rule-based reply");
            None
        }
    }
}
