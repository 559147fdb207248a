//! # Opspilot Planners
//!
//! LLM plumbing and the LLM-backed planner:
//! - `LlmClient` and its OpenAI-compatible HTTP implementation
//! - `ScriptedLlmClient` for deterministic tests
//! - `LlmPlanner`, which turns tasks into validated plans
//! - Tool catalog rendering shared by every LLM prompt

pub mod catalog;
pub mod client;
pub mod factory;
pub mod llm;

pub use catalog::render_tool_catalog;
pub use client::{
    HttpLlmClient, HttpLlmClientConfig, LlmClient, LlmError, LlmRequest, ScriptedLlmClient,
};
pub use factory::{build_llm_client, LlmBuildError};
pub use llm::{LlmPlanner, LlmPlannerConfig};
