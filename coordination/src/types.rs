//! Review primitives — verdicts, per-agent analyses and transcript messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recommendation from a single reviewer or from the aggregate council.
///
/// Verdicts carry no ordering; policies only ever compare them for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Submission is acceptable.
    Approve,
    /// Submission must not be admitted.
    Reject,
    /// Reviewer cannot decide without further discussion.
    NeedsDiscussion,
}

impl Verdict {
    /// Every verdict, in the order scores and tallies are reported.
    pub const ALL: [Verdict; 3] = [Self::Approve, Self::Reject, Self::NeedsDiscussion];

    /// Wire form used in logs and summaries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::NeedsDiscussion => "NEEDS_DISCUSSION",
        }
    }

    /// Marker used by the human-readable renderings.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Approve => "✅",
            Self::Reject => "❌",
            Self::NeedsDiscussion => "🤔",
        }
    }

    /// Scan free-form reviewer prose for an explicit verdict keyword.
    ///
    /// Only whole words count (`DISAPPROVE` is not `APPROVE`), and the last
    /// keyword wins, since reviewers close with their verdict.
    pub fn from_text(text: &str) -> Option<Self> {
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .rev()
            .find_map(|word| {
                Self::ALL
                    .into_iter()
                    .find(|v| word.eq_ignore_ascii_case(v.as_str()))
            })
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a reported confidence into `[0, 1]`. Non-finite values become 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// One reviewer's independent findings for a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeAnalysis {
    /// Blocking findings.
    pub issues: Vec<String>,
    /// Findings that need a human look but do not block on their own.
    pub warnings: Vec<String>,
    /// Signals in favour of the submission.
    pub positives: Vec<String>,
    /// The reviewer's verdict.
    pub verdict: Verdict,
    /// Confidence in the verdict (0.0–1.0).
    pub confidence: f64,
}

impl CodeAnalysis {
    /// Create an analysis with no findings.
    pub fn new(verdict: Verdict, confidence: f64) -> Self {
        Self {
            issues: Vec::new(),
            warnings: Vec::new(),
            positives: Vec::new(),
            verdict,
            confidence: clamp_confidence(confidence),
        }
    }

    /// Neutral analysis a reviewer falls back to when it cannot evaluate.
    pub fn neutral() -> Self {
        Self::new(Verdict::NeedsDiscussion, 0.5)
    }

    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_positives(mut self, positives: Vec<String>) -> Self {
        self.positives = positives;
        self
    }

    /// Re-apply the confidence clamp to an analysis built field-by-field.
    pub fn sanitized(mut self) -> Self {
        self.confidence = clamp_confidence(self.confidence);
        self
    }

    /// Short vote rationale: the first two issues joined by `"; "`.
    pub fn rationale(&self) -> String {
        self.issues
            .iter()
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Default for CodeAnalysis {
    fn default() -> Self {
        Self::neutral()
    }
}

/// A single message in the review transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewMessage {
    /// Name of the reviewer that emitted the message.
    #[serde(rename = "agent")]
    pub agent_name: String,
    /// Message body (Markdown).
    pub content: String,
    /// Verdict carried by the message, if the reviewer stated one.
    pub verdict: Option<Verdict>,
    /// When the message was emitted.
    pub timestamp: DateTime<Utc>,
    /// Reviewer this message replies to.
    pub in_reply_to: Option<String>,
}

impl ReviewMessage {
    /// Create a message stamped with the current time.
    pub fn new(agent_name: &str, content: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            content: content.into(),
            verdict: None,
            timestamp: Utc::now(),
            in_reply_to: None,
        }
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn replying_to(mut self, agent_name: &str) -> Self {
        self.in_reply_to = Some(agent_name.to_string());
        self
    }

    /// First `max_chars` characters of the content (char-boundary safe).
    pub fn excerpt(&self, max_chars: usize) -> String {
        self.content.chars().take(max_chars).collect()
    }
}
