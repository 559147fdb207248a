use async_trait::async_trait;
use serde_json::Value;

/// Realtime execution progress event.
#[derive(Debug, Clone)]
pub struct ExecutionProgressEvent {
    pub step_id: usize,
    pub tool: String,
    /// step_started, step_retrying, step_completed or step_failed
    pub phase: String,
    pub message: Option<String>,
    pub metadata: Value,
}

impl ExecutionProgressEvent {
    pub fn new(step_id: usize, tool: impl Into<String>, phase: impl Into<String>) -> Self {
        Self {
            step_id,
            tool: tool.into(),
            phase: phase.into(),
            message: None,
            metadata: Value::Null,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Sink interface for execution progress reporting.
#[async_trait]
pub trait ExecutionProgressReporter: Send + Sync {
    async fn report(&self, event: ExecutionProgressEvent) -> Result<(), String>;
}
