//! Plan Normalizer module
//!
//! Everything the executor relies on is established here:
//! - every step names a registered tool
//! - arguments satisfy the tool's input schema
//! - step ids equal positions
//! - the plan is non-empty and within the step budget
//!
//! Fixers run first and repair common LLM slips; validation runs after.

mod fixers;

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::schema;
use crate::tool::ToolMeta;
use crate::types::Plan;

pub use fixers::{CoerceNumericArguments, DropDuplicateSteps, PlanFixer};

pub const DEFAULT_MAX_STEPS: usize = 4;

/// Validation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("empty plan")]
    EmptyPlan,

    #[error("step {step_id} uses unknown tool '{tool}'")]
    UnknownTool { step_id: usize, tool: String },

    #[error("step {step_id} ({tool}) has invalid arguments: {reason}")]
    InvalidArguments {
        step_id: usize,
        tool: String,
        reason: String,
    },

    #[error("plan has {count} steps, at most {max} allowed")]
    TooManySteps { count: usize, max: usize },
}

/// Plan normalizer
pub struct PlanNormalizer {
    tools: HashMap<String, ToolMeta>,
    max_steps: usize,
    fixers: Vec<Box<dyn PlanFixer>>,
}

impl PlanNormalizer {
    /// Normalizer with the default fixers for the given catalog.
    pub fn new(catalog: &[ToolMeta]) -> Self {
        Self {
            tools: catalog
                .iter()
                .map(|meta| (meta.name.clone(), meta.clone()))
                .collect(),
            max_steps: DEFAULT_MAX_STEPS,
            fixers: vec![Box::new(CoerceNumericArguments), Box::new(DropDuplicateSteps)],
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Repair then validate. `task` fills in a missing goal.
    pub fn normalize(&self, mut plan: Plan, task: &str) -> Result<Plan, ValidationError> {
        if plan.goal.trim().is_empty() {
            plan.goal = task.trim().to_string();
        }

        for fixer in &self.fixers {
            if fixer.fix(&mut plan, &self.tools) {
                tracing::debug!(fixer = fixer.name(), "plan fixer applied");
            }
        }
        plan.renumber();

        self.validate(&plan)?;
        Ok(plan)
    }

    pub fn validate(&self, plan: &Plan) -> Result<(), ValidationError> {
        if plan.is_empty() {
            return Err(ValidationError::EmptyPlan);
        }
        if plan.len() > self.max_steps {
            return Err(ValidationError::TooManySteps {
                count: plan.len(),
                max: self.max_steps,
            });
        }

        for step in &plan.steps {
            let meta = self
                .tools
                .get(&step.tool)
                .ok_or_else(|| ValidationError::UnknownTool {
                    step_id: step.id,
                    tool: step.tool.clone(),
                })?;
            let args = Value::Object(step.arguments.clone());
            schema::validate(&args, &meta.input_schema).map_err(|reason| {
                ValidationError::InvalidArguments {
                    step_id: step.id,
                    tool: step.tool.clone(),
                    reason,
                }
            })?;
        }
        Ok(())
    }
}
