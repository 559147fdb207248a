//! # Opspilot Runtime
//!
//! Runs a task end to end:
//! - `ReplanController`: plan → execute → verify, replanning once on a partial verdict
//! - `LlmJudge`: LLM-backed completeness judge
//! - `RuntimeApp`: builds everything from `opspilot.yaml` and installs tracing

pub mod bootstrap;
pub mod controller;
pub mod judge;

pub use bootstrap::{init_tracing_if_needed, load_tool_catalog, BootstrapError, RuntimeApp};
pub use controller::{
    replan_feedback, ControllerConfig, FailureReport, ReplanController, RunError, RunPhase,
    RunStage, MIN_TASK_CHARS,
};
pub use judge::{LlmJudge, LlmJudgeConfig};
