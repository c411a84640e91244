//! Readability and structure heuristics for submitted agents.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use review_coordination::agent::last_message_from_others;
use review_coordination::{
    CodeAnalysis, ReviewMessage, ReviewerAgent, Verdict, CODE_QUALITY_REVIEWER, SECURITY_AUDITOR,
};
use tracing::debug;

use super::{bracketed, draft_reply, opening_statement, recent_conversation, Section};
use crate::llm::ChatClient;

static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"def\s+(\w+)\s*\([^)]*\)\s*:").expect("FUNCTION_DEF regex should compile")
});

static CLASS_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)").expect("CLASS_DEF regex should compile"));

static DOCUMENTED_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"def\s+\w+[^:]+:\s*\n\s*["']"#).expect("DOCUMENTED_DEF regex should compile")
});

static SINGLE_CHAR_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-z])\s*=").expect("SINGLE_CHAR_ASSIGN regex should compile")
});

static DEF_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*def\s+(\w+)").expect("DEF_LINE regex should compile"));

static TYPED_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"def\s+\w+\([^)]*:\s*\w+").expect("TYPED_PARAM regex should compile")
});

static RETURN_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"->\s*\w+").expect("RETURN_HINT regex should compile"));

static CONSTANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[A-Z_]{2,}\s*=").expect("CONSTANT regex should compile"));

static TRY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btry\s*:").expect("TRY_BLOCK regex should compile"));

/// Single-letter names conventional enough not to count against readability.
const ACCEPTABLE_SINGLE_VARS: [&str; 10] = ["i", "j", "k", "x", "y", "n", "m", "f", "e", "_"];
const MAX_LINE_CHARS: usize = 120;
const MAX_NESTING: usize = 6;
const MAX_FUNCTION_LINES: usize = 50;
const OPENING_WARNING_LIMIT: usize = 5;

/// Judges readability, documentation and structure.
pub struct CodeQualityReviewer {
    client: Option<Arc<dyn ChatClient>>,
}

impl CodeQualityReviewer {
    pub fn new(client: Option<Arc<dyn ChatClient>>) -> Self {
        Self { client }
    }

    /// Pure heuristic analysis. Quality findings are advisory and never
    /// recorded as blocking issues.
    pub fn assess(code: &str) -> CodeAnalysis {
        let mut warnings = Vec::new();
        let mut positives = Vec::new();
        let lines: Vec<&str> = code.split('\n').collect();

        // Readability
        let trimmed = code.trim();
        if trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''") {
            positives.push("Has module-level docstring".to_string());
        } else {
            warnings.push("Missing module-level docstring".to_string());
        }

        let functions: Vec<&str> = FUNCTION_DEF
            .captures_iter(code)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        let classes = CLASS_DEF.find_iter(code).count();

        if !functions.is_empty() {
            let documented = DOCUMENTED_DEF.find_iter(code).count();
            let ratio = documented as f64 / functions.len() as f64;
            if ratio >= 0.8 {
                positives.push(format!(
                    "Well-documented: {:.0}% of functions have docstrings",
                    ratio * 100.0
                ));
            } else if ratio < 0.3 {
                warnings.push(format!(
                    "Poor documentation: only {:.0}% of functions documented",
                    ratio * 100.0
                ));
            }
        }

        let unclear: BTreeSet<&str> = SINGLE_CHAR_ASSIGN
            .captures_iter(code)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .filter(|v| !ACCEPTABLE_SINGLE_VARS.contains(v))
            .collect();
        if unclear.len() > 5 {
            let names: Vec<&str> = unclear.into_iter().collect();
            warnings.push(format!(
                "Many unclear single-letter variables: {}",
                names.join(", ")
            ));
        }

        let bad_names: Vec<String> = functions
            .iter()
            .filter(|name| is_unclear_function_name(name))
            .map(|name| name.to_string())
            .collect();
        if !bad_names.is_empty() {
            warnings.push(format!("Unclear function names: {}", bracketed(&bad_names)));
        }

        // Structure
        let long_lines = lines
            .iter()
            .filter(|l| l.chars().count() > MAX_LINE_CHARS)
            .count();
        if long_lines > 0 {
            warnings.push(format!(
                "{} lines exceed {} characters",
                long_lines, MAX_LINE_CHARS
            ));
        }

        let max_indent = lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| (l.len() - l.trim_start().len()) / 4)
            .max()
            .unwrap_or(0);
        if max_indent > MAX_NESTING {
            warnings.push(format!(
                "Deep nesting detected (max {} levels) - consider refactoring",
                max_indent
            ));
        }

        let long_functions: Vec<String> = function_lengths(&lines)
            .into_iter()
            .filter(|(_, len)| *len > MAX_FUNCTION_LINES)
            .map(|(name, _)| name)
            .collect();
        if !long_functions.is_empty() {
            warnings.push(format!(
                "Long functions (>{} lines): {}",
                MAX_FUNCTION_LINES,
                bracketed(&long_functions)
            ));
        }

        // Positive signals
        let type_hints = TYPED_PARAM.find_iter(code).count() + RETURN_HINT.find_iter(code).count();
        if type_hints > 5 {
            positives.push(format!("Good use of type hints ({} found)", type_hints));
        }

        let constants = CONSTANT.find_iter(code).count();
        if constants > 0 {
            positives.push(format!("Uses named constants ({} found)", constants));
        }

        let try_blocks = TRY_BLOCK.find_iter(code).count();
        if try_blocks > 0 {
            positives.push(format!("Has error handling ({} try blocks)", try_blocks));
        }

        if classes > 0 {
            positives.push(format!("Uses classes ({} found)", classes));
        }

        if code.contains("if __name__") {
            positives.push("Has __main__ guard".to_string());
        }

        let score = quality_score(&warnings, &positives);
        let (verdict, confidence) = if score >= 5 {
            (Verdict::Approve, (0.6 + score as f64 * 0.05).min(0.9))
        } else if score >= 0 {
            (Verdict::NeedsDiscussion, 0.6)
        } else {
            (Verdict::Reject, 0.7)
        };

        CodeAnalysis::new(verdict, confidence)
            .with_warnings(warnings)
            .with_positives(positives)
    }

    fn rule_based_reply(&self, analysis: &CodeAnalysis, last: &ReviewMessage) -> ReviewMessage {
        if last.agent_name == SECURITY_AUDITOR && last.verdict == Some(Verdict::Reject) {
            let content = format!(
                "@{} raises valid security concerns. Code quality analysis is secondary when \
                 security is compromised. I support rejection pending security fixes.",
                last.agent_name
            );
            return ReviewMessage::new(CODE_QUALITY_REVIEWER, content)
                .with_verdict(Verdict::Reject)
                .replying_to(&last.agent_name);
        }

        let readability = if analysis.verdict == Verdict::Approve {
            "readable and maintainable"
        } else {
            "could use improvements"
        };
        let content = format!(
            "Regarding @{}'s points - from a code quality perspective: {} strengths, {} concerns. \
             The code is {}.",
            last.agent_name,
            analysis.positives.len(),
            analysis.warnings.len(),
            readability
        );
        ReviewMessage::new(CODE_QUALITY_REVIEWER, content)
            .with_verdict(analysis.verdict)
            .replying_to(&last.agent_name)
    }

    fn discussion_prompt(
        analysis: &CodeAnalysis,
        transcript: &[ReviewMessage],
        last: &ReviewMessage,
    ) -> String {
        format!(
            "You are the Code Quality Reviewer in a code review discussion.
Your analysis found:
- Warnings: {}
- Positives: {}

Recent conversation:
{}

Last message was from {}. Respond:
1. Address their specific points
2. Share relevant quality insights
3. Be constructive - focus on actionable feedback
4. End with your verdict: APPROVE, REJECT, or NEEDS_DISCUSSION

Keep response under 200 words.",
            bracketed(&analysis.warnings),
            bracketed(&analysis.positives),
            recent_conversation(transcript),
            last.agent_name
        )
    }
}

/// `2·positives − warnings`.
fn quality_score(warnings: &[String], positives: &[String]) -> i64 {
    positives.len() as i64 * 2 - warnings.len() as i64
}

/// Shorter than three characters, or `f` followed only by digits.
fn is_unclear_function_name(name: &str) -> bool {
    if name.chars().count() < 3 {
        return true;
    }
    name.strip_prefix('f')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Line span of each function, from its `def` to the next `def` or EOF.
fn function_lengths(lines: &[&str]) -> Vec<(String, usize)> {
    fn record(lengths: &mut Vec<(String, usize)>, name: String, len: usize) {
        match lengths.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = len,
            None => lengths.push((name, len)),
        }
    }

    let mut lengths: Vec<(String, usize)> = Vec::new();
    let mut current: Option<(String, usize)> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = DEF_LINE.captures(line) {
            if let Some((name, start)) = current.take() {
                record(&mut lengths, name, i - start);
            }
            current = Some((caps[1].to_string(), i));
        }
    }
    if let Some((name, start)) = current {
        record(&mut lengths, name, lines.len() - start);
    }
    lengths
}

#[async_trait]
impl ReviewerAgent for CodeQualityReviewer {
    fn name(&self) -> &str {
        CODE_QUALITY_REVIEWER
    }

    fn role(&self) -> &str {
        "Code Quality & Readability Specialist"
    }

    fn system_prompt(&self) -> String {
        "You are a Code Quality Reviewer AI specialized in:
- Code readability and maintainability
- Clean code principles
- Python best practices and PEP8
- Code structure and organization

You review Python agents for clarity and quality.
Be constructive - provide actionable feedback.
Balance being thorough with being practical."
            .to_string()
    }

    async fn analyze_code(&self, code: &str, filename: &str) -> CodeAnalysis {
        let analysis = Self::assess(code);
        debug!(
            filename,
            warnings = analysis.warnings.len(),
            positives = analysis.positives.len(),
            "Quality assessment complete"
        );
        analysis
    }

    async fn respond_to_discussion(
        &self,
        _code: &str,
        transcript: &[ReviewMessage],
        my_analysis: &CodeAnalysis,
    ) -> ReviewMessage {
        let Some(last) = last_message_from_others(transcript, CODE_QUALITY_REVIEWER) else {
            let content = opening_statement(
                "## Code Quality Analysis",
                &[
                    Section::new("**🚨 Critical Issues:**", &my_analysis.issues),
                    Section::new("**⚠️ Quality Concerns:**", &my_analysis.warnings)
                        .limited(OPENING_WARNING_LIMIT),
                    Section::new("**✅ Quality Highlights:**", &my_analysis.positives),
                ],
                my_analysis,
            );
            return ReviewMessage::new(CODE_QUALITY_REVIEWER, content)
                .with_verdict(my_analysis.verdict);
        };

        if let Some(client) = &self.client {
            let prompt = Self::discussion_prompt(my_analysis, transcript, last);
            if let Some(text) = draft_reply(
                client.as_ref(),
                CODE_QUALITY_REVIEWER,
                self.system_prompt(),
                prompt,
            )
            .await
            {
                let verdict = Verdict::from_text(&text).unwrap_or(my_analysis.verdict);
                return ReviewMessage::new(CODE_QUALITY_REVIEWER, text)
                    .with_verdict(verdict)
                    .replying_to(&last.agent_name);
            }
        }

        self.rule_based_reply(my_analysis, last)
    }
}
