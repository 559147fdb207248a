//! Pipeline data types
//!
//! - Plan / Step: what the planner produced
//! - StepResult / ExecutionResults: what the executor observed
//! - Verdict: what the verifier concluded
//! - StructuredResponse: what the caller receives

mod plan;
mod response;
mod result;
mod verdict;

pub use plan::{Plan, Step};
pub use response::{PlanSummary, ReplanTrace, RunMetrics, StructuredResponse};
pub use result::{ExecutionResults, StepResult, StepStatus};
pub use verdict::{Completeness, Verdict};
