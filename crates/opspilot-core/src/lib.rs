//! # Opspilot Core
//!
//! Core abstractions and deterministic logic for the opspilot pipeline.
//!
//! This crate contains:
//! - Plan / Step / StepResult / Verdict definitions
//! - Tool trait and the immutable tool registry
//! - Plan parsing, normalization and the Planner trait
//! - The segment scheduler with per-step retry and timing
//! - The Verifier and its deterministic completeness judge
//!
//! This crate does NOT care about:
//! - How the LLM is reached
//! - How tools talk to the network
//! - How results are displayed

pub mod executor;
pub mod normalizer;
pub mod planner;
pub mod schema;
pub mod tool;
pub mod types;
pub mod verifier;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::executor::{
        partition_segments, ExecutionError, ExecutionProgressEvent, ExecutionProgressReporter,
        Executor, Segment,
    };
    pub use crate::normalizer::{PlanNormalizer, ValidationError};
    pub use crate::planner::{parse_plan, ParseError, Planner, PlanningError, ReplanRequest};
    pub use crate::tool::{Tool, ToolError, ToolMeta, ToolRegistry};
    pub use crate::types::{
        Completeness, ExecutionResults, Plan, Step, StepResult, StepStatus, StructuredResponse,
        Verdict,
    };
    pub use crate::verifier::{
        CompletenessJudge, HeuristicJudge, JudgeError, JudgeRequest, Judgement, Verification,
        VerificationError, Verifier,
    };
}

// Re-export key types at crate root
pub use executor::{truncate_for_log, ExecutionError, Executor};
pub use planner::{Planner, PlanningError};
pub use tool::{Tool, ToolError, ToolMeta, ToolRegistry};
pub use types::{
    Completeness, ExecutionResults, Plan, Step, StepResult, StepStatus, StructuredResponse,
    Verdict,
};
pub use verifier::{Verification, VerificationError, Verifier};
