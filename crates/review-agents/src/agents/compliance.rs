//! Rules compliance verifier — LLM-judged conformance with the platform rules.
//!
//! Without a chat client the verifier has nothing to judge with and defers to
//! the discussion with a neutral analysis. A failed model call is neutral too,
//! but carries an advisory concern naming the failure.

use std::sync::Arc;

use async_trait::async_trait;
use review_coordination::agent::last_message_from_others;
use review_coordination::{
    clamp_confidence, CodeAnalysis, ReviewMessage, ReviewerAgent, Verdict,
    RULE_COMPLIANCE_VERIFIER,
};
use tracing::{debug, warn};

use super::{bracketed, draft_reply, opening_statement, recent_conversation, Section};
use crate::llm::{ChatClient, ChatMessage};

/// Characters of the submission included in the analysis prompt.
const PROMPT_CODE_CHARS: usize = 8000;

/// Checks SDK usage, required structure and forbidden operations.
pub struct RuleComplianceVerifier {
    client: Option<Arc<dyn ChatClient>>,
}

impl RuleComplianceVerifier {
    pub fn new(client: Option<Arc<dyn ChatClient>>) -> Self {
        Self { client }
    }

    fn analysis_prompt(code: &str, filename: &str) -> String {
        let excerpt: String = code.chars().take(PROMPT_CODE_CHARS).collect();
        format!(
            "Analyze the following Python code for term-challenge rules compliance.

File: {}

```python
{}
```

You are a rules compliance verifier checking for:
1. Proper SDK usage (term_sdk SDK 2.0 pattern OR argparse+subprocess SDK 3.0 pattern)
2. Required methods and structure (run/solve methods, ctx.done() calls, main guard)
3. Forbidden network modules (direct socket, urllib access instead of LLM proxy)
4. Sandbox escape attempts (accessing /proc, /sys, /dev, privilege manipulation)
5. Proper agent structure and completion logic

Respond in this exact format:
ISSUES: [comma-separated list of rule violations, or \"none\"]
WARNINGS: [comma-separated list of compliance concerns, or \"none\"]
POSITIVES: [comma-separated list of compliant aspects, or \"none\"]
VERDICT: [APPROVE or REJECT or NEEDS_DISCUSSION]
CONFIDENCE: [0.0 to 1.0]

Be strict but fair - rule violations are non-negotiable per AGENTS.md requirements.",
            filename, excerpt
        )
    }

    fn discussion_prompt(
        analysis: &CodeAnalysis,
        transcript: &[ReviewMessage],
        last: &ReviewMessage,
    ) -> String {
        format!(
            "You are the Rules Compliance Verifier in a code review.
Your analysis found:
- Rule Violations: {}
- Warnings: {}
- Compliant: {}

Recent conversation:
{}

Last message was from {}. Respond:
1. Rule compliance is non-negotiable
2. Cite specific rules from AGENTS.md if relevant
3. Be firm but professional
4. End with verdict: APPROVE, REJECT, or NEEDS_DISCUSSION

Keep under 200 words.",
            bracketed(&analysis.issues),
            bracketed(&analysis.warnings),
            bracketed(&analysis.positives),
            recent_conversation(transcript),
            last.agent_name
        )
    }

    fn rule_based_reply(&self, analysis: &CodeAnalysis, last: &ReviewMessage) -> ReviewMessage {
        let (content, verdict) = if analysis.issues.is_empty() {
            (
                format!(
                    "@{}: From a rules perspective, the code is compliant. \
                     SDK patterns are correct and no forbidden modules detected.",
                    last.agent_name
                ),
                analysis.verdict,
            )
        } else {
            (
                format!(
                    "Responding to @{}: While I appreciate the input, the code has {} rule \
                     violation(s) that must be fixed. These are non-negotiable per AGENTS.md \
                     requirements.",
                    last.agent_name,
                    analysis.issues.len()
                ),
                Verdict::Reject,
            )
        };
        ReviewMessage::new(RULE_COMPLIANCE_VERIFIER, content)
            .with_verdict(verdict)
            .replying_to(&last.agent_name)
    }
}

/// Parse the line-oriented analysis format.
///
/// Unrecognized lines are ignored; missing fields keep neutral defaults.
pub fn parse_analysis(response: &str) -> CodeAnalysis {
    let mut analysis = CodeAnalysis::neutral();

    for line in response.trim().lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_uppercase().as_str() {
            "ISSUES" => analysis.issues = parse_list(value),
            "WARNINGS" => analysis.warnings = parse_list(value),
            "POSITIVES" => analysis.positives = parse_list(value),
            "VERDICT" => {
                analysis.verdict = Verdict::from_text(value).unwrap_or(Verdict::NeedsDiscussion);
            }
            "CONFIDENCE" => {
                analysis.confidence = value.parse::<f64>().map(clamp_confidence).unwrap_or(0.5);
            }
            _ => {}
        }
    }
    analysis
}

/// Comma-separated findings; `none` or blank means no findings.
fn parse_list(value: &str) -> Vec<String> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl ReviewerAgent for RuleComplianceVerifier {
    fn name(&self) -> &str {
        RULE_COMPLIANCE_VERIFIER
    }

    fn role(&self) -> &str {
        "Term-Challenge Rules Compliance Specialist"
    }

    fn system_prompt(&self) -> String {
        "You are a Rules Compliance Verifier for term-challenge.
You verify code against these rules from AGENTS.md:

1. Must use term_sdk (SDK 2.0) OR argparse+subprocess (SDK 3.0)
2. No forbidden network modules (socket, urllib direct access)
3. No sandbox escape attempts
4. Proper agent structure with required methods
5. Must call ctx.done() or have clear completion

You are strict but fair. Rule violations are non-negotiable.
Security and compliance override other considerations."
            .to_string()
    }

    async fn analyze_code(&self, code: &str, filename: &str) -> CodeAnalysis {
        let Some(client) = &self.client else {
            debug!(filename, "No chat client; compliance deferred to discussion");
            return CodeAnalysis::neutral();
        };

        let messages = [
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(Self::analysis_prompt(code, filename)),
        ];
        match client.chat(&messages).await {
            Ok(response) => parse_analysis(&response),
            Err(e) => {
                warn!(filename, error = %e, "Compliance analysis failed; deferring to discussion");
                CodeAnalysis::neutral().with_warnings(vec![format!(
                    "Compliance analysis unavailable ({}); deferring to discussion",
                    e
                )])
            }
        }
    }

    async fn respond_to_discussion(
        &self,
        _code: &str,
        transcript: &[ReviewMessage],
        my_analysis: &CodeAnalysis,
    ) -> ReviewMessage {
        let Some(last) = last_message_from_others(transcript, RULE_COMPLIANCE_VERIFIER) else {
            let content = opening_statement(
                "## Rules Compliance Analysis",
                &[
                    Section::new("**🚨 Rule Violations:**", &my_analysis.issues),
                    Section::new("**⚠️ Compliance Concerns:**", &my_analysis.warnings),
                    Section::new("**✅ Compliance Verified:**", &my_analysis.positives),
                ],
                my_analysis,
            );
            return ReviewMessage::new(RULE_COMPLIANCE_VERIFIER, content)
                .with_verdict(my_analysis.verdict);
        };

        if let Some(client) = &self.client {
            let prompt = Self::discussion_prompt(my_analysis, transcript, last);
            if let Some(text) = draft_reply(
                client.as_ref(),
                RULE_COMPLIANCE_VERIFIER,
                self.system_prompt(),
                prompt,
            )
            .await
            {
                // Violations are never argued away.
                let verdict = if !my_analysis.issues.is_empty() {
                    Verdict::Reject
                } else {
                    match Verdict::from_text(&text) {
                        Some(v @ (Verdict::Approve | Verdict::NeedsDiscussion)) => v,
                        _ => my_analysis.verdict,
                    }
                };
                return ReviewMessage::new(RULE_COMPLIANCE_VERIFIER, text)
                    .with_verdict(verdict)
                    .replying_to(&last.agent_name);
            }
        }

        self.rule_based_reply(my_analysis, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let analysis = parse_analysis(
            "ISSUES: none
WARNINGS: no ctx.done() call,  missing main guard
POSITIVES: uses term_sdk
VERDICT: APPROVE
CONFIDENCE: 0.85",
        );
        assert!(analysis.issues.is_empty());
        assert_eq!(analysis.warnings, vec!["no ctx.done() call", "missing main guard"]);
        assert_eq!(analysis.positives, vec!["uses term_sdk"]);
        assert_eq!(analysis.verdict, Verdict::Approve);
        assert_eq!(analysis.confidence, 0.85);
    }

    #[test]
    fn test_parse_is_lenient() {
        let analysis = parse_analysis(
            "Here is my analysis.
issues: raw socket usage
verdict: reject (socket)
confidence: 4.2",
        );
        assert_eq!(analysis.issues, vec!["raw socket usage"]);
        assert_eq!(analysis.verdict, Verdict::Reject);
        assert_eq!(analysis.confidence, 1.0);

        let garbage = parse_analysis("CONFIDENCE: high\nVERDICT: maybe");
        assert_eq!(garbage.confidence, 0.5);
        assert_eq!(garbage.verdict, Verdict::NeedsDiscussion);
    }

    #[test]
    fn test_parse_empty_response_is_neutral() {
        assert_eq!(parse_analysis(""), CodeAnalysis::neutral());
    }

    #[test]
    fn test_prompt_truncates_code() {
        let code = "x".repeat(PROMPT_CODE_CHARS + 100);
        let prompt = RuleComplianceVerifier::analysis_prompt(&code, "agent.py");
        assert!(prompt.contains("File: agent.py"));
        assert!(prompt.contains(&"x".repeat(PROMPT_CODE_CHARS)));
        assert!(!prompt.contains(&"x".repeat(PROMPT_CODE_CHARS + 1)));
    }

    #[tokio::test]
    async fn test_without_client_is_neutral() {
        let verifier = RuleComplianceVerifier::new(None);
        let analysis = verifier.analyze_code("import socket", "agent.py").await;
        assert_eq!(analysis, CodeAnalysis::neutral());

        let msg = verifier.respond_to_discussion("", &[], &analysis).await;
        assert_eq!(
            msg.content,
            "## Rules Compliance Analysis\n\n**Verdict:** 🤔 NEEDS_DISCUSSION\n**Confidence:** 50%"
        );
    }

    #[tokio::test]
    async fn test_violations_hold_rejection() {
        let verifier = RuleComplianceVerifier::new(None);
        let analysis = CodeAnalysis::new(Verdict::Reject, 0.9)
            .with_issues(vec!["raw socket".to_string(), "no ctx.done()".to_string()]);
        let transcript = vec![
            ReviewMessage::new("CodeQualityReviewer", "clean code").with_verdict(Verdict::Approve)
        ];
        let msg = verifier
            .respond_to_discussion("", &transcript, &analysis)
            .await;
        assert_eq!(msg.verdict, Some(Verdict::Reject));
        assert!(msg.content.contains("the code has 2 rule violation(s)"));
    }

    #[tokio::test]
    async fn test_compliant_reply_keeps_verdict() {
        let verifier = RuleComplianceVerifier::new(None);
        let analysis = CodeAnalysis::new(Verdict::Approve, 0.8);
        let transcript = vec![ReviewMessage::new("SecurityAuditor", "found exec")
            .with_verdict(Verdict::Reject)];
        let msg = verifier
            .respond_to_discussion("", &transcript, &analysis)
            .await;
        assert_eq!(msg.verdict, Some(Verdict::Approve));
        assert!(msg.content.starts_with("@SecurityAuditor: From a rules perspective"));
    }
}
