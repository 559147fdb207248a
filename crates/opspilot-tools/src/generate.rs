use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use opspilot_config::ToolSpec;
use opspilot_core::tool::{Tool, ToolError, ToolMeta};
use opspilot_planners::{LlmClient, LlmError, LlmRequest};

use crate::common::{arg_string, config_f32, config_string};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_DESCRIPTION: &str = "Generate a text response for general writing tasks.";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that writes clear, concise content. \
     Follow the user's instruction and keep the response direct.";

/// Free-form writing through the configured LLM.
pub struct LlmGenerateTool {
    name: String,
    description: String,
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl LlmGenerateTool {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self::from_spec(
            &ToolSpec {
                name: "llm_generate".to_string(),
                kind: "llm_generate".to_string(),
                description: None,
                config: Value::Null,
            },
            client,
            model,
        )
    }

    /// `config.model` overrides the shared model.
    pub fn from_spec(spec: &ToolSpec, client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description_or(DEFAULT_DESCRIPTION),
            client,
            model: config_string(&spec.config, "model").unwrap_or_else(|| model.into()),
            temperature: config_f32(&spec.config, "temperature").unwrap_or(DEFAULT_TEMPERATURE),
            system_prompt: config_string(&spec.config, "system_prompt")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    /// Catalog entry for a spec, without an LLM client.
    pub fn describe(spec: &ToolSpec) -> ToolMeta {
        generate_meta(&spec.name, &spec.description_or(DEFAULT_DESCRIPTION))
    }
}

fn generate_meta(name: &str, description: &str) -> ToolMeta {
    ToolMeta::new(name, description)
        .with_input_schema(json!({
            "type": "object",
            "required": ["instruction"],
            "properties": {
                "instruction": {
                    "type": "string",
                    "description": "what to write, e.g. Write a 60-second intro speech."
                }
            }
        }))
        .with_output_schema(json!({
            "type": "object",
            "required": ["text"],
            "properties": {"text": {"type": "string"}}
        }))
        .with_keywords(["write", "draft", "compose", "speech", "essay", "poem", "email"])
}

#[async_trait]
impl Tool for LlmGenerateTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn metadata(&self) -> ToolMeta {
        generate_meta(&self.name, &self.description)
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let instruction = arg_string(arguments, "instruction")
            .ok_or_else(|| ToolError::InvalidArguments("missing 'instruction'".to_string()))?;
        let text = self
            .client
            .complete(LlmRequest {
                system: self.system_prompt.clone(),
                user: instruction,
                model: self.model.clone(),
                temperature: self.temperature,
                json_mode: false,
            })
            .await
            .map_err(|err| match err {
                LlmError::Timeout(ms) => ToolError::Timeout(ms),
                other => ToolError::Transport(other.to_string()),
            })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ToolError::InvalidOutput("model returned empty text".to_string()));
        }
        Ok(json!({ "text": text }))
    }

    fn summarize(&self, output: &Value) -> Option<String> {
        output
            .get("text")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }
}
