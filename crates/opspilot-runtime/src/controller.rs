//! Replan controller - plan → execute → verify, with at most one corrective pass.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use opspilot_core::executor::{ExecutionError, Executor};
use opspilot_core::planner::{Planner, PlanningError, ReplanRequest};
use opspilot_core::tool::{ToolMeta, ToolRegistry};
use opspilot_core::types::{
    Completeness, ExecutionResults, Plan, PlanSummary, ReplanTrace, RunMetrics,
    StepResult, StructuredResponse, Verdict,
};
use opspilot_core::verifier::{
    collect_sources, synthesize_answer, Verification, VerificationError, Verifier,
};

/// Shortest task text accepted.
pub const MIN_TASK_CHARS: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Planning,
    Executing,
    Verifying,
    Replanning,
    ReExecuting,
    ReVerifying,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Verifying => "verifying",
            Self::Replanning => "replanning",
            Self::ReExecuting => "re_executing",
            Self::ReVerifying => "re_verifying",
            Self::Done => "done",
        }
    }
}

/// Stage a fatal error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Planning,
    Executing,
    Verifying,
    Replanning,
    Timeout,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Verifying => "verifying",
            Self::Replanning => "replanning",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal failure of one `run`.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid task: {0}")]
    InvalidTask(String),
    #[error("planning failed: {0}")]
    Planning(PlanningError),
    #[error("execution failed: {0}")]
    Execution(ExecutionError),
    #[error("verification failed: {0}")]
    Verification(VerificationError),
    #[error("replanning failed: {0}")]
    Replanning(PlanningError),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
}

impl RunError {
    pub fn stage(&self) -> RunStage {
        match self {
            Self::InvalidTask(_) | Self::Planning(_) => RunStage::Planning,
            Self::Execution(_) => RunStage::Executing,
            Self::Verification(_) => RunStage::Verifying,
            Self::Replanning(_) => RunStage::Replanning,
            Self::Timeout(_) => RunStage::Timeout,
        }
    }

    pub fn report(&self) -> FailureReport {
        FailureReport {
            stage: self.stage(),
            message: self.to_string(),
        }
    }
}

/// Serializable `{stage, message}` for callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub stage: RunStage,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub request_timeout: Duration,
    /// Replan once when the first verdict is partial.
    pub auto_replan: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            auto_replan: true,
        }
    }
}

/// One plan/execute/verify pass.
struct Pass {
    plan: Plan,
    verification: Verification,
}

/// Drives a single request through planning, execution and verification.
pub struct ReplanController {
    planner: Arc<dyn Planner>,
    executor: Arc<Executor>,
    verifier: Arc<Verifier>,
    config: ControllerConfig,
}

impl ReplanController {
    pub fn new(planner: Arc<dyn Planner>, executor: Arc<Executor>, verifier: Arc<Verifier>) -> Self {
        Self {
            planner,
            executor,
            verifier,
            config: ControllerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The tool catalog the planner sees.
    pub fn catalog(&self) -> Vec<ToolMeta> {
        self.executor.registry().catalog()
    }

    /// Plan without executing.
    pub async fn plan_only(&self, task: &str) -> Result<Plan, RunError> {
        let task = validate_task(task)?;
        let catalog = self.catalog();
        self.planner
            .plan(task, &catalog)
            .await
            .map_err(RunError::Planning)
    }

    /// Run a task end to end.
    pub async fn run(&self, task: &str) -> Result<StructuredResponse, RunError> {
        let task = validate_task(task)?;
        let request_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        info!(request_id = %request_id, task = %task, "run started");

        let timeout_ms = self.config.request_timeout.as_millis() as u64;
        let outcome = tokio::time::timeout(self.config.request_timeout, self.run_passes(task))
            .await
            .map_err(|_| RunError::Timeout(timeout_ms));
        let (last, replan) = match outcome.and_then(|inner| inner) {
            Ok(passes) => passes,
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    stage = %err.stage(),
                    error = %err,
                    "run failed"
                );
                return Err(err);
            }
        };

        let Pass { plan, verification } = last;
        let total_duration_ms = started.elapsed().as_millis() as u64;
        info!(
            request_id = %request_id,
            completeness = %verification.verdict.completeness,
            replanned = replan.is_some(),
            total_duration_ms,
            "run finished"
        );

        Ok(StructuredResponse {
            request_id,
            task: task.to_string(),
            started_at,
            plan: PlanSummary::from(&plan),
            metrics: RunMetrics::from_results(&verification.results),
            results: verification.results,
            verdict: verification.verdict,
            answer: verification.answer,
            sources: verification.sources,
            replan,
            total_duration_ms,
        })
    }

    async fn run_passes(&self, task: &str) -> Result<(Pass, Option<ReplanTrace>), RunError> {
        let catalog = self.catalog();

        enter(RunPhase::Planning);
        let plan = self
            .planner
            .plan(task, &catalog)
            .await
            .map_err(RunError::Planning)?;
        let first = self
            .execute_and_verify(task, plan, RunPhase::Executing, RunPhase::Verifying)
            .await?;

        let completeness = first.verification.verdict.completeness;
        if completeness != Completeness::Partial || !self.config.auto_replan {
            enter(RunPhase::Done);
            return Ok((first, None));
        }

        enter(RunPhase::Replanning);
        let feedback = replan_feedback(&first.verification.verdict, &first.verification.results);
        info!(feedback = %feedback, "first pass partial, replanning");
        let plan = self
            .planner
            .replan(
                ReplanRequest {
                    task,
                    previous_plan: &first.plan,
                    previous_results: &first.verification.results,
                    feedback: &feedback,
                },
                &catalog,
            )
            .await
            .map_err(RunError::Replanning)?;
        let mut second = self
            .execute_and_verify(task, plan, RunPhase::ReExecuting, RunPhase::ReVerifying)
            .await?;
        enter(RunPhase::Done);

        let carried_forward = carry_forward(
            self.executor.registry(),
            &first.verification.results,
            &mut second.verification,
        );
        info!(
            completeness = %second.verification.verdict.completeness,
            carried_forward = ?carried_forward,
            "replan finished"
        );

        let Pass { plan, verification } = first;
        let trace = ReplanTrace {
            feedback,
            previous_plan: plan,
            previous_results: verification.results,
            previous_verdict: verification.verdict,
            carried_forward,
        };
        Ok((second, Some(trace)))
    }

    async fn execute_and_verify(
        &self,
        task: &str,
        plan: Plan,
        execute_phase: RunPhase,
        verify_phase: RunPhase,
    ) -> Result<Pass, RunError> {
        enter(execute_phase);
        let results = self
            .executor
            .execute(&plan)
            .await
            .map_err(RunError::Execution)?;
        enter(verify_phase);
        let verification = self
            .verifier
            .verify(task, &plan, results)
            .await
            .map_err(RunError::Verification)?;
        Ok(Pass { plan, verification })
    }
}

fn enter(phase: RunPhase) {
    info!(phase = phase.as_str(), "run phase");
}

fn validate_task(task: &str) -> Result<&str, RunError> {
    let trimmed = task.trim();
    if trimmed.chars().count() < MIN_TASK_CHARS {
        return Err(RunError::InvalidTask(format!(
            "task must be at least {} characters",
            MIN_TASK_CHARS
        )));
    }
    Ok(trimmed)
}

/// Fold first-pass successes the replanned pass did not reproduce into its
/// answer and sources. Verdict and results stay those of the replanned pass.
/// Returns the carried tool names.
fn carry_forward(
    registry: &ToolRegistry,
    earlier: &ExecutionResults,
    last: &mut Verification,
) -> Vec<String> {
    let carried: Vec<StepResult> = earlier
        .successful()
        .filter(|prior| {
            !last
                .results
                .successful()
                .any(|r| r.tool == prior.tool && r.arguments == prior.arguments)
        })
        .cloned()
        .collect();
    if carried.is_empty() {
        return Vec::new();
    }
    let tools = carried.iter().map(|r| r.tool.clone()).collect();

    let last_succeeded = last.results.any_succeeded();
    let merged = ExecutionResults::new(
        carried
            .into_iter()
            .chain(last.results.iter().cloned())
            .collect(),
    );
    let judge_answer = last_succeeded.then_some(last.answer.as_str());
    last.answer = synthesize_answer(registry, &merged, judge_answer);
    last.sources = collect_sources(&merged);
    tools
}

/// Rationale, step errors and limitations, in that order.
pub fn replan_feedback(verdict: &Verdict, results: &ExecutionResults) -> String {
    let mut parts = Vec::new();
    let rationale = verdict.rationale.trim();
    if !rationale.is_empty() {
        parts.push(rationale.to_string());
    }
    if let Some(refinement) = verdict
        .suggested_refinement
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
    {
        parts.push(format!("Suggested: {}", refinement));
    }
    let errors: Vec<String> = results
        .failed()
        .map(|r| {
            format!(
                "{}: {}",
                r.tool,
                r.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();
    if !errors.is_empty() {
        parts.push(format!("Errors: {}", errors.join("; ")));
    }
    if !verdict.limitations.is_empty() {
        parts.push(format!("Limitations: {}", verdict.limitations.join("; ")));
    }
    parts.join(" ")
}
