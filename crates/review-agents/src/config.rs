//! Reviewer council configuration: consensus settings plus the optional LLM
//! endpoint, from environment variables and an optional TOML file.
//!
//! ```toml
//! [review]
//! consensus_method = "weighted"
//! max_rounds = 5
//!
//! [llm]
//! url = "http://localhost:8080/v1"
//! model = "qwen2.5-coder"
//! ```

use std::path::{Path, PathBuf};

use review_coordination::{ReviewConfig, ReviewError};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ReviewError),
}

/// OpenAI-compatible chat endpoint used by the reviewers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmEndpoint {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmEndpoint {
    fn default() -> Self {
        Self {
            url: std::env::var("REVIEW_LLM_URL")
                .unwrap_or_else(|_| "http://localhost:8080/v1".into()),
            api_key: std::env::var("REVIEW_LLM_API_KEY").ok(),
            model: std::env::var("REVIEW_LLM_MODEL").unwrap_or_else(|_| "gpt-4o".into()),
            timeout_secs: 60,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

impl LlmEndpoint {
    /// Endpoint from the environment, present only when `REVIEW_LLM_URL` is set.
    pub fn from_env() -> Option<Self> {
        std::env::var("REVIEW_LLM_URL").ok()?;
        Some(Self::default())
    }
}

/// Top-level configuration for the reviewer council.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Consensus policy and round limit.
    pub review: ReviewConfig,
    /// LLM endpoint; `None` runs every reviewer rule-based.
    pub llm: Option<LlmEndpoint>,
}

impl AgentsConfig {
    /// Defaults, with the LLM endpoint taken from the environment.
    pub fn from_env() -> Self {
        Self {
            review: ReviewConfig::default(),
            llm: LlmEndpoint::from_env(),
        }
    }

    /// Parse a TOML document. A missing `[llm]` table falls back to the
    /// environment.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(contents)?;
        if config.llm.is_none() {
            config.llm = LlmEndpoint::from_env();
        }
        config.review.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_coordination::{ConsensusMethod, SECURITY_AUDITOR};

    #[test]
    fn test_parse_review_table() {
        let config = AgentsConfig::from_toml_str(
            r#"
[review]
consensus_method = "majority"
max_rounds = 5
parallel_analysis = true

[review.role_weights]
default_weight = 2.0
"#,
        )
        .unwrap();
        assert_eq!(config.review.consensus_method, ConsensusMethod::Majority);
        assert_eq!(config.review.max_rounds, 5);
        assert!(config.review.parallel_analysis);
        assert_eq!(config.review.role_weights.weight_for("anyone"), 2.0);
        // Unlisted entries keep their defaults.
        assert_eq!(config.review.role_weights.weight_for(SECURITY_AUDITOR), 1.5);
    }

    #[test]
    fn test_parse_llm_table() {
        let config = AgentsConfig::from_toml_str(
            r#"
[llm]
url = "http://vllm:8000/v1"
model = "qwen2.5-coder-32b"
timeout_secs = 10
"#,
        )
        .unwrap();
        let llm = config.llm.unwrap();
        assert_eq!(llm.url, "http://vllm:8000/v1");
        assert_eq!(llm.model, "qwen2.5-coder-32b");
        assert_eq!(llm.timeout_secs, 10);
        assert_eq!(llm.max_tokens, 1024);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = AgentsConfig::from_toml_str("[review]\nconsensus_method = \"plurality\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let err = AgentsConfig::from_toml_str("[review]\nmax_rounds = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ReviewError::InvalidMaxRounds(0))
        ));
    }

    #[test]
    fn test_invalid_role_weights_rejected() {
        let err = AgentsConfig::from_toml_str(
            "[review.role_weights]\ndefault_weight = -1.0\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ReviewError::InvalidRoleWeight { ref agent, .. })
                if agent == "default_weight"
        ));

        let err = AgentsConfig::from_toml_str(
            "[review.role_weights.weights]\nSecurityAuditor = nan\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ReviewError::InvalidRoleWeight { ref agent, .. })
                if agent == SECURITY_AUDITOR
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.toml");
        std::fs::write(&path, "[review]\nconsensus_method = \"unanimous\"\n").unwrap();

        let config = AgentsConfig::load(&path).unwrap();
        assert_eq!(config.review.consensus_method, ConsensusMethod::Unanimous);

        let missing = AgentsConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
