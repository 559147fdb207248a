//! Tool abstraction module
//!
//! - Tool: an opaque capability the executor can invoke by name
//! - ToolMeta: declared name, description, schemas and intent keywords
//! - ToolRegistry: the immutable catalog shared across requests

mod registry;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use registry::ToolRegistry;

/// Failure of a single tool invocation. Always recoverable at the step level.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid output: {0}")]
    InvalidOutput(String),
}

/// A tool the planner may name and the executor may invoke.
///
/// Tools are read-only queries from the pipeline's point of view, so
/// invoking one twice with the same arguments is always allowed.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique registry name
    fn name(&self) -> &str;

    /// One-line description shown to the planner
    fn description(&self) -> &str;

    /// Declared shapes and intent keywords
    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description())
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError>;

    /// Human-readable sentence describing a successful output.
    fn summarize(&self, _output: &Value) -> Option<String> {
        None
    }
}

/// Catalog entry for one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolMeta {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub input_schema: Value,
    /// JSON schema of a successful output
    pub output_schema: Value,
    /// Lowercase words whose presence in a task implies this tool is needed
    pub keywords: Vec<String>,
}

impl ToolMeta {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Value::Null,
            output_schema: Value::Null,
            keywords: Vec::new(),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Whether any keyword occurs as a word in `task`.
    pub fn matches_intent(&self, task: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let words: Vec<String> = task
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        self.keywords
            .iter()
            .any(|keyword| words.iter().any(|word| word == keyword))
    }
}
