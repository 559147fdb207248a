use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Plan, Step};

/// Why raw model output could not become a plan.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("plan schema violation: {0}")]
    Schema(String),
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default, alias = "name", alias = "tool_name")]
    tool: Option<String>,
    #[serde(default, alias = "args", alias = "params")]
    arguments: Option<Value>,
    #[serde(default, alias = "parallel_eligible")]
    parallel: Option<bool>,
    #[serde(default)]
    purpose: Option<String>,
}

/// Slice the outermost `{...}` out of text that may wrap it in prose or fences.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse raw model output into a plan.
///
/// Step ids the model wrote are ignored; every step gets its position.
pub fn parse_plan(raw: &str) -> Result<Plan, ParseError> {
    let json = extract_json(raw).ok_or(ParseError::NoJson)?;
    let value: Value =
        serde_json::from_str(json).map_err(|err| ParseError::InvalidJson(err.to_string()))?;
    let raw_plan: RawPlan =
        serde_json::from_value(value).map_err(|err| ParseError::Schema(err.to_string()))?;

    let raw_steps = raw_plan
        .steps
        .ok_or_else(|| ParseError::Schema("missing 'steps' array".to_string()))?;

    let mut steps = Vec::with_capacity(raw_steps.len());
    for (idx, raw_step) in raw_steps.into_iter().enumerate() {
        let tool = raw_step
            .tool
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ParseError::Schema(format!("step {} has no tool", idx)))?;
        let arguments = match raw_step.arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(ParseError::Schema(format!(
                    "step {} arguments must be an object, got {}",
                    idx,
                    json_kind(&other)
                )))
            }
        };
        steps.push(Step {
            id: idx,
            tool,
            arguments,
            parallel: raw_step.parallel.unwrap_or(true),
            purpose: raw_step.purpose.unwrap_or_default(),
        });
    }

    Ok(Plan::new(raw_plan.goal.unwrap_or_default(), steps))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
