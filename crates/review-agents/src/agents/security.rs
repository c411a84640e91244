//! Security auditor — obfuscation and dangerous-operation scanning.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use base64::Engine as _;
use regex::Regex;
use review_coordination::agent::last_message_from_others;
use review_coordination::{
    CodeAnalysis, ReviewMessage, ReviewerAgent, Verdict, SECURITY_AUDITOR,
};
use tracing::debug;

use super::{bracketed, draft_reply, opening_statement, recent_conversation, Section};
use crate::llm::ChatClient;

/// Patterns that indicate hidden or injected code. Each hit is an issue.
static OBFUSCATION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    compile(&[
        (r#"exec\s*\(\s*["']"#, "Direct exec() with string"),
        (r#"eval\s*\(\s*["']"#, "Direct eval() with string"),
        (r"compile\s*\(", "compile() usage - potential code injection"),
        (r"__import__\s*\(", "Dynamic import - potential obfuscation"),
        (r"getattr\s*\(\s*__builtins__", "Accessing builtins via getattr"),
        (r"base64\.(b64decode|decode)", "Base64 decoding - check for hidden code"),
        (r"codecs\.(decode|encode)", "Codecs usage - potential obfuscation"),
        (r"\\x[0-9a-fA-F]{2}", "Hex-encoded strings"),
        (r"chr\s*\(\s*\d+\s*\)", "chr() calls - potential string obfuscation"),
        (r"ord\s*\([^)]+\)\s*\^", "XOR obfuscation pattern"),
        (r"lambda\s*:\s*None", "Suspicious lambda"),
        (r#"type\s*\(\s*["']"#, "Dynamic type creation"),
        (r#"["'][A-Za-z0-9+/]{50,}={0,2}["']"#, "Potential base64 encoded string"),
        (r"\\u[0-9a-fA-F]{4}", "Unicode escape sequences"),
        (r"zlib\.(decompress|compress)", "Compression - potential code hiding"),
        (r"marshal\.(loads|dumps)", "Marshal - bytecode serialization"),
        (r"pickle\.(loads|load)", "Pickle - deserialization risk"),
    ])
});

/// Operations that need a second look but do not block on their own.
static DANGEROUS_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    compile(&[
        (r"os\.system\s*\(", "os.system() - shell command execution"),
        (r"subprocess\.Popen.*shell\s*=\s*True", "subprocess with shell=True"),
        (r"socket\.(socket|connect|bind)", "Direct socket operations"),
        (r"urllib\.request\.urlopen", "Direct URL access"),
        (r"requests\.(get|post|put|delete)", "HTTP requests library"),
        (r"ctypes\.", "ctypes - low-level memory access"),
        (r"multiprocessing\.(Process|Pool)", "Multiprocessing usage"),
        (r"threading\.(Thread|Lock)", "Threading operations"),
        (r#"open\s*\([^)]*["']w["']"#, "File write operations"),
        (r"shutil\.(rmtree|remove)", "Destructive file operations"),
    ])
});

static BASE64_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']([A-Za-z0-9+/]{40,}={0,2})["']"#).expect("BASE64_LITERAL regex should compile")
});

static SINGLE_CHAR_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-z])\s*=").expect("SINGLE_CHAR_ASSIGN regex should compile")
});

static AGENT_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"def\s+(setup|solve|run|cleanup)\s*\(").expect("AGENT_METHOD regex should compile")
});

static INLINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#.*[A-Za-z]").expect("INLINE_COMMENT regex should compile"));

const CODE_KEYWORDS: [&str; 5] = ["import", "def ", "class ", "exec", "eval"];
const MAX_LINE_CHARS: usize = 500;
const MAX_SINGLE_CHAR_ASSIGNMENTS: usize = 20;

fn compile(patterns: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    patterns
        .iter()
        .map(|(pattern, description)| {
            let re = Regex::new(pattern).expect("security pattern should compile");
            (re, *description)
        })
        .collect()
}

/// Scans submissions for obfuscated, encoded or dangerous code.
pub struct SecurityAuditor {
    client: Option<Arc<dyn ChatClient>>,
}

impl SecurityAuditor {
    pub fn new(client: Option<Arc<dyn ChatClient>>) -> Self {
        Self { client }
    }

    /// Pure rule-based scan.
    pub fn scan(code: &str) -> CodeAnalysis {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        let mut positives = Vec::new();
        let lines: Vec<&str> = code.split('\n').collect();

        for (re, description) in OBFUSCATION_PATTERNS.iter() {
            for (i, line) in lines.iter().enumerate() {
                if re.is_match(line) {
                    issues.push(format!("Line {}: {}", i + 1, description));
                }
            }
        }

        for (re, description) in DANGEROUS_PATTERNS.iter() {
            for (i, line) in lines.iter().enumerate() {
                if re.is_match(line) {
                    warnings.push(format!(
                        "Line {}: {} - verify legitimate use",
                        i + 1,
                        description
                    ));
                }
            }
        }

        for caps in BASE64_LITERAL.captures_iter(code) {
            let literal = &caps[1];
            if decodes_to_code(literal) {
                let prefix: String = literal.chars().take(30).collect();
                issues.push(format!("Detected base64-encoded Python code: {}...", prefix));
            }
        }

        for (i, line) in lines.iter().enumerate() {
            let len = line.chars().count();
            if len > MAX_LINE_CHARS && !line.trim().starts_with('#') {
                warnings.push(format!(
                    "Line {}: Very long line ({} chars) - potential obfuscation",
                    i + 1,
                    len
                ));
            }
        }

        let single_char = SINGLE_CHAR_ASSIGN.find_iter(code).count();
        if single_char > MAX_SINGLE_CHAR_ASSIGNMENTS {
            warnings.push(format!(
                "Excessive single-character variables ({}) - may indicate obfuscation",
                single_char
            ));
        }

        if code.contains("term_sdk") {
            positives.push("Uses official term_sdk".to_string());
        }
        if AGENT_METHOD.is_match(code) {
            positives.push("Has standard agent methods".to_string());
        }
        if code.contains("\"\"\"") || code.contains("'''") {
            positives.push("Has docstrings".to_string());
        }
        if INLINE_COMMENT.is_match(code) {
            positives.push("Has inline comments".to_string());
        }

        let (verdict, confidence) = if !issues.is_empty() {
            (Verdict::Reject, (0.5 + issues.len() as f64 * 0.1).min(0.9))
        } else if !warnings.is_empty() {
            (Verdict::NeedsDiscussion, 0.6)
        } else {
            (Verdict::Approve, 0.8)
        };

        CodeAnalysis::new(verdict, confidence)
            .with_issues(issues)
            .with_warnings(warnings)
            .with_positives(positives)
    }

    fn rule_based_reply(&self, analysis: &CodeAnalysis, last: &ReviewMessage) -> ReviewMessage {
        let (content, verdict) = match last.verdict {
            Some(Verdict::Approve) if !analysis.issues.is_empty() => {
                let listed: Vec<String> = analysis
                    .issues
                    .iter()
                    .take(3)
                    .map(|i| format!("- {}", i))
                    .collect();
                (
                    format!(
                        "I understand @{}'s perspective, but I maintain my concerns about security. \
                         The following issues cannot be ignored:\n\n{}",
                        last.agent_name,
                        listed.join("\n")
                    ),
                    Verdict::Reject,
                )
            }
            Some(Verdict::Reject) if analysis.issues.is_empty() => (
                format!(
                    "From a pure security standpoint, I found no critical issues. \
                     However, I defer to @{}'s concerns in their domain.",
                    last.agent_name
                ),
                Verdict::NeedsDiscussion,
            ),
            _ => (
                format!(
                    "Acknowledged @{}'s points. My security assessment stands: \
                     {} critical issues, {} warnings.",
                    last.agent_name,
                    analysis.issues.len(),
                    analysis.warnings.len()
                ),
                analysis.verdict,
            ),
        };

        ReviewMessage::new(SECURITY_AUDITOR, content)
            .with_verdict(verdict)
            .replying_to(&last.agent_name)
    }

    fn discussion_prompt(
        analysis: &CodeAnalysis,
        transcript: &[ReviewMessage],
        last: &ReviewMessage,
    ) -> String {
        format!(
            "You are the Security Auditor in a code review discussion.
Your analysis found:
- Issues: {}
- Warnings: {}
- Positives: {}

Recent conversation:
{}

Last message was from {}. Respond thoughtfully:
1. Acknowledge their points
2. Maintain/adjust your security assessment
3. Provide specific evidence from code
4. End with your current verdict: APPROVE, REJECT, or NEEDS_DISCUSSION

Keep response under 200 words. Be professional but direct.",
            bracketed(&analysis.issues),
            bracketed(&analysis.warnings),
            bracketed(&analysis.positives),
            recent_conversation(transcript),
            last.agent_name
        )
    }
}

/// Whether a base64 literal decodes to something that looks like source code.
fn decodes_to_code(literal: &str) -> bool {
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(literal) else {
        return false;
    };
    let decoded = String::from_utf8_lossy(&bytes).to_lowercase();
    CODE_KEYWORDS.iter().any(|kw| decoded.contains(kw))
}

#[async_trait]
impl ReviewerAgent for SecurityAuditor {
    fn name(&self) -> &str {
        SECURITY_AUDITOR
    }

    fn role(&self) -> &str {
        "Security & Obfuscation Detection Specialist"
    }

    fn system_prompt(&self) -> String {
        "You are a Security Auditor AI specialized in detecting:
- Obfuscated or encoded malicious code
- Dangerous operations (file system, network, process execution)
- Code injection vulnerabilities
- Sandbox escape attempts

You are reviewing Python code submissions for an AI agent competition.
Be thorough but fair - flag real security issues, not coding style preferences.
Your job is to protect the platform from malicious submissions."
            .to_string()
    }

    async fn analyze_code(&self, code: &str, filename: &str) -> CodeAnalysis {
        let analysis = Self::scan(code);
        debug!(
            filename,
            issues = analysis.issues.len(),
            warnings = analysis.warnings.len(),
            "Security scan complete"
        );
        analysis
    }

    async fn respond_to_discussion(
        &self,
        _code: &str,
        transcript: &[ReviewMessage],
        my_analysis: &CodeAnalysis,
    ) -> ReviewMessage {
        let Some(last) = last_message_from_others(transcript, SECURITY_AUDITOR) else {
            let content = opening_statement(
                "## Security Analysis",
                &[
                    Section::new("**🚨 Critical Issues Found:**", &my_analysis.issues),
                    Section::new("**⚠️ Warnings:**", &my_analysis.warnings),
                    Section::new("**✅ Positive Signals:**", &my_analysis.positives),
                ],
                my_analysis,
            );
            return ReviewMessage::new(SECURITY_AUDITOR, content).with_verdict(my_analysis.verdict);
        };

        if let Some(client) = &self.client {
            let prompt = Self::discussion_prompt(my_analysis, transcript, last);
            if let Some(text) =
                draft_reply(client.as_ref(), SECURITY_AUDITOR, self.system_prompt(), prompt).await
            {
                let verdict = Verdict::from_text(&text).unwrap_or(my_analysis.verdict);
                return ReviewMessage::new(SECURITY_AUDITOR, text)
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

    const CLEAN_AGENT: &str = r#""""Simple term agent."""
from term_sdk import Agent

# Solve the task step by step
def solve(task):
    return task.answer
"#;

    #[test]
    fn test_clean_code_is_approved() {
        let analysis = SecurityAuditor::scan(CLEAN_AGENT);
        assert!(analysis.issues.is_empty());
        assert!(analysis.warnings.is_empty());
        assert_eq!(analysis.verdict, Verdict::Approve);
        assert_eq!(analysis.confidence, 0.8);
        assert_eq!(
            analysis.positives,
            vec![
                "Uses official term_sdk",
                "Has standard agent methods",
                "Has docstrings",
                "Has inline comments"
            ]
        );
    }

    #[test]
    fn test_exec_string_is_rejected() {
        let analysis = SecurityAuditor::scan("x = 1\nexec('print(1)')\n");
        assert_eq!(analysis.issues, vec!["Line 2: Direct exec() with string"]);
        assert_eq!(analysis.verdict, Verdict::Reject);
        assert!((analysis.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_rejection_confidence_is_capped() {
        let code = "eval('1')\nexec('2')\n__import__('os')\nmarshal.loads(b)\npickle.loads(b)\n";
        let analysis = SecurityAuditor::scan(code);
        assert!(analysis.issues.len() >= 5);
        assert_eq!(analysis.confidence, 0.9);
    }

    #[test]
    fn test_dangerous_operations_are_warnings() {
        let analysis =
            SecurityAuditor::scan("import os\nos.system('ls')\nopen('out.txt', 'w')\n");
        assert!(analysis.issues.is_empty());
        assert_eq!(
            analysis.warnings,
            vec![
                "Line 2: os.system() - shell command execution - verify legitimate use",
                "Line 3: File write operations - verify legitimate use"
            ]
        );
        assert_eq!(analysis.verdict, Verdict::NeedsDiscussion);
        assert_eq!(analysis.confidence, 0.6);
    }

    #[test]
    fn test_base64_encoded_code_is_detected() {
        // base64 of "import os; os.system('rm -rf /tmp/x')"
        let payload = base64::engine::general_purpose::STANDARD
            .encode("import os; os.system('rm -rf /tmp/x')");
        let code = format!("data = \"{}\"\n", payload);
        let analysis = SecurityAuditor::scan(&code);
        assert!(analysis
            .issues
            .iter()
            .any(|i| i.starts_with("Detected base64-encoded Python code: ")));
    }

    #[test]
    fn test_long_line_and_single_char_noise() {
        let long = format!("s = '{}'", "a b ".repeat(150));
        let noise: String = ('a'..='z').map(|c| format!("{} = 1\n", c)).collect();
        let analysis = SecurityAuditor::scan(&format!("{}\n{}", long, noise));
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.starts_with("Line 1: Very long line")));
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.starts_with("Excessive single-character variables (27)")));
    }

    #[tokio::test]
    async fn test_opening_statement() {
        let auditor = SecurityAuditor::new(None);
        let analysis = auditor.analyze_code("exec('x')", "agent.py").await;
        let msg = auditor.respond_to_discussion("exec('x')", &[], &analysis).await;
        assert_eq!(msg.agent_name, SECURITY_AUDITOR);
        assert_eq!(msg.verdict, Some(Verdict::Reject));
        assert!(msg.in_reply_to.is_none());
        assert!(msg.content.starts_with("## Security Analysis\n\n**🚨 Critical Issues Found:**"));
        assert!(msg.content.ends_with("**Verdict:** ❌ REJECT\n**Confidence:** 60%"));
    }

    #[tokio::test]
    async fn test_holds_rejection_against_approval() {
        let auditor = SecurityAuditor::new(None);
        let analysis = SecurityAuditor::scan("exec('x')");
        let transcript = vec![
            ReviewMessage::new(SECURITY_AUDITOR, "opening"),
            ReviewMessage::new("CodeQualityReviewer", "looks fine").with_verdict(Verdict::Approve),
        ];
        let msg = auditor
            .respond_to_discussion("exec('x')", &transcript, &analysis)
            .await;
        assert_eq!(msg.verdict, Some(Verdict::Reject));
        assert_eq!(msg.in_reply_to.as_deref(), Some("CodeQualityReviewer"));
        assert!(msg.content.contains("- Line 1: Direct exec() with string"));
    }

    #[tokio::test]
    async fn test_defers_when_clean_but_others_reject() {
        let auditor = SecurityAuditor::new(None);
        let analysis = SecurityAuditor::scan(CLEAN_AGENT);
        let transcript = vec![ReviewMessage::new("RuleComplianceVerifier", "violation")
            .with_verdict(Verdict::Reject)];
        let msg = auditor
            .respond_to_discussion(CLEAN_AGENT, &transcript, &analysis)
            .await;
        assert_eq!(msg.verdict, Some(Verdict::NeedsDiscussion));
        assert!(msg.content.contains("I defer to @RuleComplianceVerifier"));
    }

    #[tokio::test]
    async fn test_acknowledges_otherwise() {
        let auditor = SecurityAuditor::new(None);
        let analysis = SecurityAuditor::scan(CLEAN_AGENT);
        let transcript = vec![ReviewMessage::new("CodeQualityReviewer", "hmm")];
        let msg = auditor
            .respond_to_discussion(CLEAN_AGENT, &transcript, &analysis)
            .await;
        assert_eq!(msg.verdict, Some(Verdict::Approve));
        assert!(msg
            .content
            .contains("My security assessment stands: 0 critical issues, 0 warnings."));
    }
}
