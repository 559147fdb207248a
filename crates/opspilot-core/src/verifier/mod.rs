//! Verifier module
//!
//! The Verifier is responsible for:
//! - Re-dispatching failed steps once more before judging
//! - Asking a completeness judge for a verdict
//! - Capping the verdict by what actually failed
//! - Building the final answer and source list
//!
//! Incompleteness is a verdict, never an error.

mod answer;
mod heuristic;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::executor::{ExecutionError, Executor};
use crate::tool::ToolMeta;
use crate::types::{Completeness, ExecutionResults, Plan, Verdict};

pub use answer::{collect_sources, synthesize_answer};
pub use heuristic::HeuristicJudge;

/// Added whenever a step is still failed after the safety-net re-run.
pub const FAILED_TOOLS_LIMITATION: &str = "Some tools failed after retry; partial data returned.";

/// Judge errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JudgeError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("judge timed out after {0} ms")]
    Timeout(u64),

    #[error("invalid judge output: {0}")]
    InvalidOutput(String),
}

/// Fatal verification failure.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("completeness judge failed: {0}")]
    Judge(#[from] JudgeError),

    #[error("re-running failed steps failed: {0}")]
    Rerun(#[from] ExecutionError),
}

/// Inputs handed to a completeness judge.
#[derive(Debug, Clone, Copy)]
pub struct JudgeRequest<'a> {
    pub task: &'a str,
    pub plan: &'a Plan,
    pub results: &'a ExecutionResults,
    pub catalog: &'a [ToolMeta],
}

/// What a judge concluded.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub completeness: Completeness,
    pub rationale: String,
    /// Optional answer text proposed by the judge
    pub answer: Option<String>,
    pub limitations: Vec<String>,
    pub suggested_refinement: Option<String>,
}

impl Judgement {
    pub fn new(completeness: Completeness, rationale: impl Into<String>) -> Self {
        Self {
            completeness,
            rationale: rationale.into(),
            answer: None,
            limitations: Vec::new(),
            suggested_refinement: None,
        }
    }
}

/// Classifies a pass as complete, partial or failed.
#[async_trait]
pub trait CompletenessJudge: Send + Sync {
    fn name(&self) -> &str;

    async fn judge(&self, request: JudgeRequest<'_>) -> Result<Judgement, JudgeError>;
}

/// Outcome of verifying one pass.
#[derive(Debug, Clone)]
pub struct Verification {
    pub verdict: Verdict,
    /// Results after the safety-net re-run
    pub results: ExecutionResults,
    pub answer: String,
    pub sources: Vec<String>,
}

pub struct Verifier {
    executor: Arc<Executor>,
    judge: Arc<dyn CompletenessJudge>,
    rerun_failed: bool,
}

impl Verifier {
    pub fn new(executor: Arc<Executor>, judge: Arc<dyn CompletenessJudge>) -> Self {
        Self {
            executor,
            judge,
            rerun_failed: true,
        }
    }

    /// Disable the re-dispatch of failed steps before judging.
    pub fn with_rerun_failed(mut self, rerun_failed: bool) -> Self {
        self.rerun_failed = rerun_failed;
        self
    }

    pub async fn verify(
        &self,
        task: &str,
        plan: &Plan,
        results: ExecutionResults,
    ) -> Result<Verification, VerificationError> {
        let results = if self.rerun_failed && results.any_failed() {
            self.executor.retry_failed(plan, &results).await?
        } else {
            results
        };

        let registry = self.executor.registry();
        let catalog = registry.catalog();
        let judgement = self
            .judge
            .judge(JudgeRequest {
                task,
                plan,
                results: &results,
                catalog: &catalog,
            })
            .await?;

        let answer = synthesize_answer(registry, &results, judgement.answer.as_deref());
        let sources = collect_sources(&results);
        let verdict = apply_floor(judgement, &results);

        tracing::info!(
            judge = self.judge.name(),
            completeness = %verdict.completeness,
            failed_steps = results.failed().count(),
            sources = sources.len(),
            "verification finished"
        );

        Ok(Verification {
            verdict,
            results,
            answer,
            sources,
        })
    }
}

/// A judge may be optimistic; failed steps are not negotiable.
fn apply_floor(judgement: Judgement, results: &ExecutionResults) -> Verdict {
    let mut verdict = Verdict {
        completeness: judgement.completeness,
        rationale: judgement.rationale,
        limitations: Vec::new(),
        suggested_refinement: judgement.suggested_refinement,
    };
    for limitation in judgement.limitations {
        verdict.push_limitation(limitation);
    }

    if results.is_empty() || !results.any_succeeded() {
        verdict.completeness = Completeness::Failed;
    } else if results.any_failed() {
        verdict.completeness = verdict.completeness.min(Completeness::Partial);
    }
    if results.any_failed() {
        verdict.push_limitation(FAILED_TOOLS_LIMITATION);
    }
    if verdict.rationale.trim().is_empty() {
        verdict.rationale = format!(
            "{} of {} steps succeeded.",
            results.successful().count(),
            results.len()
        );
    }
    verdict
}
