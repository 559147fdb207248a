//! Planner module
//!
//! The Planner is responsible for:
//! - Turning a task into an ordered plan of tool calls
//! - Closing the gap of a previous pass when asked to replan
//!
//! The Planner does NOT handle:
//! - Executing anything
//! - Retrying tools
//! - Judging results

mod parse;

use async_trait::async_trait;
use thiserror::Error;

use crate::tool::ToolMeta;
use crate::types::{ExecutionResults, Plan};

pub use parse::{extract_json, parse_plan, ParseError};

/// Fatal planning failure. No plan is produced.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanningError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("planner timed out after {0} ms")]
    Timeout(u64),

    #[error("invalid plan after {attempts} attempt(s): {reason}")]
    InvalidOutput { attempts: u32, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Everything a planner needs to close the gap of a previous pass.
#[derive(Debug, Clone)]
pub struct ReplanRequest<'a> {
    pub task: &'a str,
    pub previous_plan: &'a Plan,
    pub previous_results: &'a ExecutionResults,
    /// What was missing or wrong
    pub feedback: &'a str,
}

/// Produces plans from task text and the tool catalog.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, task: &str, catalog: &[ToolMeta]) -> Result<Plan, PlanningError>;

    async fn replan(
        &self,
        request: ReplanRequest<'_>,
        catalog: &[ToolMeta],
    ) -> Result<Plan, PlanningError>;
}
