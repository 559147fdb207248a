//! Caller-facing response

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ExecutionResults, Plan, Verdict};

/// Compact view of a plan for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub goal: String,
    pub step_count: usize,
    /// One line per step: `#0 github_search(query="fastapi") [parallel]`
    pub steps: Vec<String>,
}

impl From<&Plan> for PlanSummary {
    fn from(plan: &Plan) -> Self {
        let steps = plan
            .steps
            .iter()
            .map(|step| {
                let args = step
                    .arguments
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mode = if step.parallel {
                    "parallel"
                } else {
                    "sequential"
                };
                format!("#{} {}({}) [{}]", step.id, step.tool, args, mode)
            })
            .collect();
        Self {
            goal: plan.goal.clone(),
            step_count: plan.len(),
            steps,
        }
    }
}

/// The first pass, kept when a replan replaced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanTrace {
    pub feedback: String,
    pub previous_plan: Plan,
    pub previous_results: ExecutionResults,
    pub previous_verdict: Verdict,
    /// First-pass tools whose outputs were folded into the final answer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub carried_forward: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Sum of step durations in the final pass
    pub tool_execution_ms: u64,
    /// Number of steps in the final pass
    pub tool_count: usize,
}

impl RunMetrics {
    pub fn from_results(results: &ExecutionResults) -> Self {
        Self {
            tool_execution_ms: results.tool_time().as_millis() as u64,
            tool_count: results.len(),
        }
    }
}

/// Final, immutable output of one `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub request_id: Uuid,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub plan: PlanSummary,
    pub results: ExecutionResults,
    pub verdict: Verdict,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replan: Option<ReplanTrace>,
    pub metrics: RunMetrics,
    pub total_duration_ms: u64,
}

impl StructuredResponse {
    pub fn replanned(&self) -> bool {
        self.replan.is_some()
    }
}
