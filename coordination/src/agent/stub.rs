//! Deterministic scripted reviewer for testing.
//!
//! Never performs I/O. Each discussion round answers with the next scripted
//! verdict and records what part of the transcript it could see, so tests
//! can assert sequential visibility.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{last_message_from_others, ReviewerAgent};
use crate::types::{CodeAnalysis, ReviewMessage, Verdict};

/// What a scripted reviewer saw when asked to speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Transcript length at the time of the call.
    pub transcript_len: usize,
    /// Author of the last message in the transcript.
    pub last_speaker: Option<String>,
}

/// Shared handle onto a scripted reviewer's observations.
#[derive(Debug, Clone, Default)]
pub struct Observer(Arc<Mutex<Vec<Observation>>>);

impl Observer {
    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<Observation> {
        self.0.lock().map(|obs| obs.clone()).unwrap_or_default()
    }

    fn record(&self, observation: Observation) {
        if let Ok(mut obs) = self.0.lock() {
            obs.push(observation);
        }
    }
}

/// Reviewer with a fixed analysis and a scripted verdict per round.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    name: String,
    analysis: CodeAnalysis,
    /// Verdict per discussion round; `None` replies carry no verdict.
    replies: Vec<Option<Verdict>>,
    advisory: Option<String>,
    observer: Observer,
}

impl ScriptedAgent {
    /// Reviewer that keeps its analysis verdict in every round.
    pub fn new(name: &str, verdict: Verdict, confidence: f64) -> Self {
        Self {
            name: name.to_string(),
            analysis: CodeAnalysis::new(verdict, confidence),
            replies: Vec::new(),
            advisory: None,
            observer: Observer::default(),
        }
    }

    /// Reviewer whose collaborator is down: neutral analysis, advisory replies.
    pub fn degraded(name: &str) -> Self {
        Self {
            advisory: Some(format!(
                "{} could not complete its analysis; deferring to discussion.",
                name
            )),
            ..Self::new(name, Verdict::NeedsDiscussion, 0.5)
        }
    }

    /// Replace the analysis returned by `analyze_code`.
    pub fn with_analysis(mut self, analysis: CodeAnalysis) -> Self {
        self.analysis = analysis;
        self
    }

    /// Script the verdicts for discussion rounds 1, 2, ...
    ///
    /// Rounds beyond the script repeat the analysis verdict.
    pub fn with_replies(mut self, replies: Vec<Option<Verdict>>) -> Self {
        self.replies = replies;
        self
    }

    pub fn observer(&self) -> Observer {
        self.observer.clone()
    }

    fn opening_statement(&self) -> String {
        if let Some(advisory) = &self.advisory {
            return advisory.clone();
        }
        format!(
            "{} findings: {} issues, {} warnings, {} positives. Verdict: {} ({:.0}%)",
            self.name,
            self.analysis.issues.len(),
            self.analysis.warnings.len(),
            self.analysis.positives.len(),
            self.analysis.verdict,
            self.analysis.confidence * 100.0
        )
    }
}

#[async_trait]
impl ReviewerAgent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn system_prompt(&self) -> String {
        format!("You are {}, a scripted reviewer.", self.name)
    }

    async fn analyze_code(&self, _code: &str, _filename: &str) -> CodeAnalysis {
        self.analysis.clone()
    }

    async fn respond_to_discussion(
        &self,
        _code: &str,
        transcript: &[ReviewMessage],
        my_analysis: &CodeAnalysis,
    ) -> ReviewMessage {
        self.observer.record(Observation {
            transcript_len: transcript.len(),
            last_speaker: transcript.last().map(|m| m.agent_name.clone()),
        });

        if transcript.is_empty() {
            return ReviewMessage::new(&self.name, self.opening_statement())
                .with_verdict(my_analysis.verdict);
        }

        let own_messages = transcript
            .iter()
            .filter(|m| m.agent_name == self.name)
            .count();
        let round_index = own_messages.saturating_sub(1);
        let verdict = self
            .replies
            .get(round_index)
            .copied()
            .unwrap_or(Some(my_analysis.verdict));

        let content = match &self.advisory {
            Some(advisory) => advisory.clone(),
            None => format!("Round {} reply from {}", round_index + 1, self.name),
        };
        let mut message = ReviewMessage::new(&self.name, content);
        if let Some(verdict) = verdict {
            message = message.with_verdict(verdict);
        }
        if let Some(last) = last_message_from_others(transcript, &self.name) {
            message = message.replying_to(&last.agent_name);
        }
        message
    }
}
