//! Plan type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single planned tool invocation.
///
/// `id` is the step's position in its plan. The normalizer enforces this,
/// so downstream code may index results by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: usize,
    /// Registered tool name
    pub tool: String,
    /// Tool arguments, keyed by input schema property
    #[serde(default, alias = "args")]
    pub arguments: Map<String, Value>,
    /// Whether this step may run concurrently with its neighbours
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// One-line reason the planner gave for this step
    #[serde(default)]
    pub purpose: String,
}

fn default_parallel() -> bool {
    true
}

impl Step {
    pub fn new(id: usize, tool: impl Into<String>) -> Self {
        Self {
            id,
            tool: tool.into(),
            arguments: Map::new(),
            parallel: true,
            purpose: String::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    /// Whether two steps would issue the exact same call.
    pub fn same_call(&self, other: &Step) -> bool {
        self.tool == other.tool && self.arguments == other.arguments
    }
}

/// Ordered sequence of steps produced by the planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            goal: goal.into(),
            steps,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get_step(&self, id: usize) -> Option<&Step> {
        self.steps.get(id)
    }

    /// Distinct tool names in first-use order.
    pub fn tools_used(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for step in &self.steps {
            if !out.contains(&step.tool.as_str()) {
                out.push(step.tool.as_str());
            }
        }
        out
    }

    /// Reassign ids to match positions.
    pub fn renumber(&mut self) {
        for (idx, step) in self.steps.iter_mut().enumerate() {
            step.id = idx;
        }
    }
}
