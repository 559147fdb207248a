//! Executor module
//!
//! The Executor is responsible for:
//! - Segment scheduling (concurrent runs, sequential barriers)
//! - One retry per failed step
//! - Per-step wall-clock timing
//! - Reassembling results in plan order

mod progress;
mod segment;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::{sleep, timeout};

use crate::schema;
use crate::tool::{Tool, ToolError, ToolRegistry};
use crate::types::{ExecutionResults, Plan, Step, StepResult};

pub use progress::{ExecutionProgressEvent, ExecutionProgressReporter};
pub use segment::{partition_segments, Segment};

const MAX_LOG_TEXT_CHARS: usize = 2_000;
const MAX_LOG_JSON_CHARS: usize = 8_000;
/// Initial attempt plus exactly one retry.
const EXECUTE_ATTEMPTS: u32 = 2;
/// Safety-net re-dispatch is a single attempt.
const RERUN_ATTEMPTS: u32 = 1;
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

fn truncate_json_for_log(value: &Value, max_chars: usize) -> String {
    truncate_for_log(&value.to_string(), max_chars)
}

/// Plan and registry disagree. Tool-level failures never surface here.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("step {step_id} references unregistered tool '{tool}'")]
    UnknownTool { step_id: usize, tool: String },

    #[error("step at position {position} has id {found}")]
    StepIdMismatch { position: usize, found: usize },

    #[error("expected {expected} results, got {actual}")]
    ResultsMismatch { expected: usize, actual: usize },

    #[error("no result recorded for step {0}")]
    MissingResult(usize),
}

/// The executor
pub struct Executor {
    registry: Arc<ToolRegistry>,
    step_timeout: Duration,
    retry_delay: Duration,
    progress_reporter: Option<Arc<dyn ExecutionProgressReporter>>,
}

impl Executor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            progress_reporter: None,
        }
    }

    /// Per-attempt timeout.
    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Pause between a failed attempt and its retry.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ExecutionProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run every step of `plan`. Returns one result per step, in plan order.
    pub async fn execute(&self, plan: &Plan) -> Result<ExecutionResults, ExecutionError> {
        let tools = self.resolve_tools(plan)?;
        let mut slots: Vec<Option<StepResult>> = vec![None; plan.len()];

        for segment in partition_segments(plan) {
            self.run_segment(plan, &tools, &segment, EXECUTE_ATTEMPTS, &mut slots)
                .await;
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| slot.ok_or(ExecutionError::MissingResult(idx)))
            .collect::<Result<Vec<_>, _>>()?;
        let results = ExecutionResults::new(results);
        tracing::info!(
            steps = results.len(),
            failed = results.failed().count(),
            tool_ms = results.tool_time().as_millis() as u64,
            "plan execution finished"
        );
        Ok(results)
    }

    /// Re-dispatch only the failed steps, once each, keeping segment order.
    /// Attempts and duration accumulate onto the previous result.
    pub async fn retry_failed(
        &self,
        plan: &Plan,
        results: &ExecutionResults,
    ) -> Result<ExecutionResults, ExecutionError> {
        if results.len() != plan.len() {
            return Err(ExecutionError::ResultsMismatch {
                expected: plan.len(),
                actual: results.len(),
            });
        }
        let failed = results.failed_ids();
        if failed.is_empty() {
            return Ok(results.clone());
        }
        let tools = self.resolve_tools(plan)?;
        tracing::info!(failed_steps = ?failed, "re-dispatching failed steps");

        let mut slots: Vec<Option<StepResult>> = vec![None; plan.len()];
        for segment in partition_segments(plan) {
            if let Some(segment) = segment.retain(|id| failed.contains(&id)) {
                self.run_segment(plan, &tools, &segment, RERUN_ATTEMPTS, &mut slots)
                    .await;
            }
        }

        let mut merged = results.clone();
        for rerun in slots.into_iter().flatten() {
            let Some(previous) = results.get(rerun.step_id) else {
                return Err(ExecutionError::MissingResult(rerun.step_id));
            };
            let combined = StepResult {
                attempts: previous.attempts + rerun.attempts,
                duration: previous.duration + rerun.duration,
                ..rerun
            };
            merged.replace(combined);
        }
        Ok(merged)
    }

    fn resolve_tools(&self, plan: &Plan) -> Result<Vec<Arc<dyn Tool>>, ExecutionError> {
        plan.steps
            .iter()
            .enumerate()
            .map(|(position, step)| {
                if step.id != position {
                    return Err(ExecutionError::StepIdMismatch {
                        position,
                        found: step.id,
                    });
                }
                self.registry
                    .get(&step.tool)
                    .ok_or_else(|| ExecutionError::UnknownTool {
                        step_id: step.id,
                        tool: step.tool.clone(),
                    })
            })
            .collect()
    }

    /// Dispatch every step of a segment together and join them all.
    async fn run_segment(
        &self,
        plan: &Plan,
        tools: &[Arc<dyn Tool>],
        segment: &Segment,
        max_attempts: u32,
        slots: &mut [Option<StepResult>],
    ) {
        let mut in_flight = FuturesUnordered::new();
        for step_id in segment.step_ids() {
            let (Some(step), Some(tool)) = (plan.get_step(step_id), tools.get(step_id)) else {
                continue;
            };
            let tool = Arc::clone(tool);
            let args = Value::Object(step.arguments.clone());
            tracing::info!(
                step_id = step.id,
                tool = %step.tool,
                args = %truncate_json_for_log(&args, MAX_LOG_JSON_CHARS),
                "step execution started"
            );
            self.report(
                ExecutionProgressEvent::new(step.id, &step.tool, "step_started")
                    .with_metadata(json!({ "arguments": step.arguments })),
            )
            .await;
            in_flight.push(async move { self.run_step(tool, step, max_attempts).await });
        }

        while let Some(result) = in_flight.next().await {
            self.record_completion(&result).await;
            if let Some(slot) = slots.get_mut(result.step_id) {
                *slot = Some(result);
            }
        }
    }

    async fn run_step(&self, tool: Arc<dyn Tool>, step: &Step, max_attempts: u32) -> StepResult {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.invoke_once(tool.as_ref(), step).await {
                Ok(output) => {
                    return StepResult::success(
                        step.id,
                        &step.tool,
                        step.arguments.clone(),
                        output,
                        attempt,
                        started.elapsed(),
                    )
                }
                Err(err) if attempt < max_attempts => {
                    let message = err.to_string();
                    tracing::warn!(
                        step_id = step.id,
                        tool = %step.tool,
                        attempt,
                        error = %truncate_for_log(&message, MAX_LOG_TEXT_CHARS),
                        retry_in_ms = self.retry_delay.as_millis() as u64,
                        "retrying step after tool error"
                    );
                    self.report(
                        ExecutionProgressEvent::new(step.id, &step.tool, "step_retrying")
                            .with_message(message)
                            .with_metadata(json!({
                                "attempt": attempt,
                                "retry_in_ms": self.retry_delay.as_millis() as u64,
                            })),
                    )
                    .await;
                    if !self.retry_delay.is_zero() {
                        sleep(self.retry_delay).await;
                    }
                }
                Err(err) => {
                    return StepResult::failed(
                        step.id,
                        &step.tool,
                        step.arguments.clone(),
                        err.to_string(),
                        attempt,
                        started.elapsed(),
                    )
                }
            }
        }
    }

    async fn invoke_once(&self, tool: &dyn Tool, step: &Step) -> Result<Value, ToolError> {
        let output = match timeout(self.step_timeout, tool.invoke(&step.arguments)).await {
            Ok(result) => result?,
            Err(_) => return Err(ToolError::Timeout(self.step_timeout.as_millis() as u64)),
        };
        schema::validate(&output, &tool.metadata().output_schema)
            .map_err(ToolError::InvalidOutput)?;
        Ok(output)
    }

    async fn record_completion(&self, result: &StepResult) {
        if result.is_success() {
            let preview = result
                .output
                .as_ref()
                .map(|v| truncate_json_for_log(v, MAX_LOG_JSON_CHARS))
                .unwrap_or_default();
            tracing::info!(
                step_id = result.step_id,
                tool = %result.tool,
                attempts = result.attempts,
                duration_ms = result.duration_ms(),
                output = %preview,
                "step execution completed"
            );
            self.report(
                ExecutionProgressEvent::new(result.step_id, &result.tool, "step_completed")
                    .with_metadata(json!({
                        "attempts": result.attempts,
                        "duration_ms": result.duration_ms(),
                    })),
            )
            .await;
        } else {
            let error = result.error.clone().unwrap_or_default();
            tracing::warn!(
                step_id = result.step_id,
                tool = %result.tool,
                attempts = result.attempts,
                duration_ms = result.duration_ms(),
                error = %truncate_for_log(&error, MAX_LOG_TEXT_CHARS),
                "step execution failed"
            );
            self.report(
                ExecutionProgressEvent::new(result.step_id, &result.tool, "step_failed")
                    .with_message(error)
                    .with_metadata(json!({
                        "attempts": result.attempts,
                        "duration_ms": result.duration_ms(),
                    })),
            )
            .await;
        }
    }

    async fn report(&self, event: ExecutionProgressEvent) {
        if let Some(reporter) = &self.progress_reporter {
            if let Err(err) = reporter.report(event).await {
                tracing::warn!("failed to report execution progress: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests;
