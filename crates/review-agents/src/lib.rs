//! Review Agents
//!
//! The concrete reviewer council for agent submissions:
//! - [`SecurityAuditor`], [`CodeQualityReviewer`] and [`RuleComplianceVerifier`]
//! - An OpenAI-compatible [`ChatClient`] the reviewers consult for prose
//! - [`AgentsConfig`] loading from the environment and TOML files
//!
//! Orchestration and consensus live in `review_coordination`.

#![allow(clippy::uninlined_format_args)]

pub mod agents;
pub mod config;
pub mod llm;

pub use agents::{default_roster, CodeQualityReviewer, RuleComplianceVerifier, SecurityAuditor};
pub use config::{AgentsConfig, ConfigError, LlmEndpoint};
pub use llm::{ChatClient, ChatMessage, ChatRole, LlmError, OpenAiChatClient};
