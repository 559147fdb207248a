//! Step result type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Terminal status of one step in one execution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
}

/// Outcome of a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: usize,
    pub tool: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of tool invocations spent on this step so far
    pub attempts: u32,
    /// Wall-clock time from first dispatch to completion, retries included
    #[serde(rename = "duration_ms", with = "duration_ms_serde")]
    pub duration: Duration,
}

impl StepResult {
    pub fn success(
        step_id: usize,
        tool: impl Into<String>,
        arguments: Map<String, Value>,
        output: Value,
        attempts: u32,
        duration: Duration,
    ) -> Self {
        Self {
            step_id,
            tool: tool.into(),
            arguments,
            status: StepStatus::Success,
            output: Some(output),
            error: None,
            attempts,
            duration,
        }
    }

    pub fn failed(
        step_id: usize,
        tool: impl Into<String>,
        arguments: Map<String, Value>,
        error: impl Into<String>,
        attempts: u32,
        duration: Duration,
    ) -> Self {
        Self {
            step_id,
            tool: tool.into(),
            arguments,
            status: StepStatus::Failed,
            output: None,
            error: Some(error.into()),
            attempts,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// One result per plan step, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionResults(Vec<StepResult>);

impl ExecutionResults {
    pub fn new(results: Vec<StepResult>) -> Self {
        Self(results)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, step_id: usize) -> Option<&StepResult> {
        self.0.get(step_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepResult> {
        self.0.iter()
    }

    /// Overwrite the result at its own step position.
    pub fn replace(&mut self, result: StepResult) -> bool {
        match self.0.get_mut(result.step_id) {
            Some(slot) => {
                *slot = result;
                true
            }
            None => false,
        }
    }

    pub fn successful(&self) -> impl Iterator<Item = &StepResult> {
        self.0.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &StepResult> {
        self.0.iter().filter(|r| r.is_failed())
    }

    pub fn any_failed(&self) -> bool {
        self.0.iter().any(StepResult::is_failed)
    }

    pub fn any_succeeded(&self) -> bool {
        self.0.iter().any(StepResult::is_success)
    }

    pub fn failed_ids(&self) -> Vec<usize> {
        self.failed().map(|r| r.step_id).collect()
    }

    /// Sum of per-step durations.
    pub fn tool_time(&self) -> Duration {
        self.0.iter().map(|r| r.duration).sum()
    }
}

impl<'a> IntoIterator for &'a ExecutionResults {
    type Item = &'a StepResult;
    type IntoIter = std::slice::Iter<'a, StepResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_result_serializes_duration_in_millis() {
        let result = StepResult::success(
            0,
            "llm_generate",
            Map::new(),
            json!({"text": "hi"}),
            1,
            Duration::from_millis(1500),
        );
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["duration_ms"], json!(1500));
        assert_eq!(value["status"], json!("success"));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_replace_overwrites_in_place() {
        let mut results = ExecutionResults::new(vec![
            StepResult::failed(0, "a", Map::new(), "boom", 2, Duration::ZERO),
            StepResult::failed(1, "b", Map::new(), "boom", 2, Duration::ZERO),
        ]);
        let replaced = results.replace(StepResult::success(
            1,
            "b",
            Map::new(),
            json!({}),
            3,
            Duration::ZERO,
        ));
        assert!(replaced);
        assert_eq!(results.len(), 2);
        assert_eq!(results.failed_ids(), vec![0]);
        assert!(!results.replace(StepResult::success(
            7,
            "c",
            Map::new(),
            json!({}),
            1,
            Duration::ZERO
        )));
    }
}
