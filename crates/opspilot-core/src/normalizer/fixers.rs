use std::collections::HashMap;

use serde_json::Value;

use crate::schema;
use crate::tool::ToolMeta;
use crate::types::Plan;

/// A repair applied to raw planner output before validation.
pub trait PlanFixer: Send + Sync {
    fn name(&self) -> &str;

    /// Returns true if the plan was changed.
    fn fix(&self, plan: &mut Plan, tools: &HashMap<String, ToolMeta>) -> bool;
}

/// Turns `"3"` into `3` where the tool schema asks for a number, and `3.0`
/// into `3` where it asks for an integer.
pub struct CoerceNumericArguments;

impl PlanFixer for CoerceNumericArguments {
    fn name(&self) -> &str {
        "coerce_numeric_arguments"
    }

    fn fix(&self, plan: &mut Plan, tools: &HashMap<String, ToolMeta>) -> bool {
        let mut changed = false;
        for step in &mut plan.steps {
            let Some(meta) = tools.get(&step.tool) else {
                continue;
            };
            for (key, value) in step.arguments.iter_mut() {
                let coerced = match (schema::property_type(&meta.input_schema, key), &*value) {
                    (Some("integer"), Value::String(text)) => {
                        let text = text.trim();
                        text.parse::<i64>()
                            .ok()
                            .or_else(|| text.parse::<f64>().ok().and_then(integral))
                            .map(Value::from)
                    }
                    (Some("integer"), Value::Number(number))
                        if !number.is_i64() && !number.is_u64() =>
                    {
                        number.as_f64().and_then(integral).map(Value::from)
                    }
                    (Some("number"), Value::String(text)) => text
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number),
                    _ => None,
                };
                if let Some(coerced) = coerced {
                    *value = coerced;
                    changed = true;
                }
            }
        }
        changed
    }
}

fn integral(number: f64) -> Option<i64> {
    let in_range = number >= i64::MIN as f64 && number <= i64::MAX as f64;
    (number.is_finite() && number.fract() == 0.0 && in_range).then_some(number as i64)
}

/// Drops steps that repeat an earlier step's tool and arguments.
pub struct DropDuplicateSteps;

impl PlanFixer for DropDuplicateSteps {
    fn name(&self) -> &str {
        "drop_duplicate_steps"
    }

    fn fix(&self, plan: &mut Plan, _tools: &HashMap<String, ToolMeta>) -> bool {
        let before = plan.steps.len();
        let mut kept: Vec<crate::types::Step> = Vec::with_capacity(before);
        for step in plan.steps.drain(..) {
            if !kept.iter().any(|existing| existing.same_call(&step)) {
                kept.push(step);
            }
        }
        plan.steps = kept;
        plan.steps.len() != before
    }
}
