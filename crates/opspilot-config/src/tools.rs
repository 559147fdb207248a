//! Tool configuration types.

use serde::Deserialize;
use serde_json::Value;

/// Tools section. An empty list means "register every built-in tool".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

impl ToolsConfig {
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Single tool definition from config.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    /// Registry name the planner sees.
    pub name: String,
    /// Built-in kind: `github_search`, `weather_current` or `llm_generate`.
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Kind-specific settings (endpoints, token env, defaults).
    #[serde(default)]
    pub config: Value,
}

impl ToolSpec {
    pub fn description_or(&self, fallback: &str) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
