//! Conversation log — the sealed audit record of one review.
//!
//! The JSON form is the stable machine interface; `render_transcript` is a
//! derived, human-readable view of the same data in append order.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consensus::ConsensusResult;
use crate::error::{ReviewError, ReviewResult};
use crate::types::{CodeAnalysis, ReviewMessage};

const CODE_HASH_LEN: usize = 16;
const BANNER_WIDTH: usize = 60;
const MESSAGE_RULE_WIDTH: usize = 40;

/// First 16 hex characters of the SHA-256 digest of `code`.
pub fn code_hash(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(CODE_HASH_LEN);
    hash
}

/// Append-only record of one review, sealed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    pub code_hash: String,
    pub filename: String,
    pub started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    messages: Vec<ReviewMessage>,
    analyses: IndexMap<String, CodeAnalysis>,
    consensus_result: Option<ConsensusResult>,
}

impl ConversationLog {
    /// Open a log for `code`, stamped with the current time.
    pub fn new(code: &str, filename: &str) -> Self {
        Self {
            code_hash: code_hash(code),
            filename: filename.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            messages: Vec::new(),
            analyses: IndexMap::new(),
            consensus_result: None,
        }
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Transcript in emission order.
    pub fn messages(&self) -> &[ReviewMessage] {
        &self.messages
    }

    /// Phase-1 analyses keyed by reviewer, in registration order.
    pub fn analyses(&self) -> &IndexMap<String, CodeAnalysis> {
        &self.analyses
    }

    pub fn consensus_result(&self) -> Option<&ConsensusResult> {
        self.consensus_result.as_ref()
    }

    pub fn is_sealed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Append a transcript message.
    pub fn push_message(&mut self, message: ReviewMessage) -> ReviewResult<()> {
        self.ensure_open()?;
        self.messages.push(message);
        Ok(())
    }

    /// Record a reviewer's Phase-1 analysis.
    pub fn record_analysis(&mut self, agent_name: &str, analysis: CodeAnalysis) -> ReviewResult<()> {
        self.ensure_open()?;
        self.analyses.insert(agent_name.to_string(), analysis);
        Ok(())
    }

    /// Attach the final result and close the log.
    pub fn seal(&mut self, result: ConsensusResult) -> ReviewResult<()> {
        self.ensure_open()?;
        self.consensus_result = Some(result);
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_open(&self) -> ReviewResult<()> {
        if self.is_sealed() {
            Err(ReviewError::LogSealed)
        } else {
            Ok(())
        }
    }

    /// Whether the review admitted the submission.
    pub fn is_accepted(&self) -> bool {
        self.consensus_result
            .as_ref()
            .is_some_and(ConsensusResult::is_accepted)
    }

    /// Messages emitted by `agent_name`, in order.
    pub fn messages_from<'a>(&'a self, agent_name: &'a str) -> impl Iterator<Item = &'a ReviewMessage> {
        self.messages.iter().filter(move |m| m.agent_name == agent_name)
    }

    pub fn to_json(&self) -> ReviewResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> ReviewResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ReviewResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Chat-style rendering of the transcript and the final summary.
    pub fn render_transcript(&self) -> String {
        let banner = "═".repeat(BANNER_WIDTH);
        let mut out = String::new();

        let _ = writeln!(out, "{}", banner);
        let _ = writeln!(out, "📋 CODE REVIEW SESSION");
        let _ = writeln!(out, "File: {}", self.filename);
        let _ = writeln!(out, "Started: {}", self.started_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "{}", banner);
        let _ = writeln!(out);

        for msg in &self.messages {
            let marker = msg
                .verdict
                .map(|v| format!(" {}", v.marker()))
                .unwrap_or_default();
            let reply = msg
                .in_reply_to
                .as_ref()
                .map(|to| format!(" (replying to @{})", to))
                .unwrap_or_default();

            let _ = writeln!(
                out,
                "┌─ [{}] **{}**{}{}",
                msg.timestamp.format("%H:%M:%S"),
                msg.agent_name,
                marker,
                reply
            );
            let _ = writeln!(out, "│");
            for line in msg.content.split('\n') {
                let _ = writeln!(out, "│  {}", line);
            }
            let _ = writeln!(out, "│");
            let _ = writeln!(out, "└{}", "─".repeat(MESSAGE_RULE_WIDTH));
            let _ = writeln!(out);
        }

        if let Some(result) = &self.consensus_result {
            let _ = writeln!(out, "{}", banner);
            let _ = writeln!(out, "{}", result.summary);
            let _ = write!(out, "{}", banner);
        }

        out
    }
}
