use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use opspilot_config::{ToolSpec, ToolsConfig};
use opspilot_core::tool::{Tool, ToolMeta, ToolRegistry};
use opspilot_planners::LlmClient;

use crate::generate::LlmGenerateTool;
use crate::github::GitHubSearchTool;
use crate::weather::WeatherCurrentTool;

/// Tool factory errors
#[derive(Debug, Error)]
pub enum ToolBuildError {
    #[error("unknown tool kind: {0}")]
    UnknownKind(String),
    #[error("tool '{0}' needs an llm client")]
    MissingLlmClient(String),
}

/// Built-in tool kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    GithubSearch,
    WeatherCurrent,
    LlmGenerate,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::GithubSearch,
        ToolKind::WeatherCurrent,
        ToolKind::LlmGenerate,
    ];

    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim() {
            "github_search" => Some(Self::GithubSearch),
            "weather_current" => Some(Self::WeatherCurrent),
            "llm_generate" => Some(Self::LlmGenerate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GithubSearch => "github_search",
            Self::WeatherCurrent => "weather_current",
            Self::LlmGenerate => "llm_generate",
        }
    }

    fn default_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.as_str().to_string(),
            kind: self.as_str().to_string(),
            description: None,
            config: Value::Null,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build one tool from its spec. `llm_generate` needs `llm`.
pub fn build_tool(
    spec: &ToolSpec,
    llm: Option<&Arc<dyn LlmClient>>,
    model: &str,
) -> Result<Arc<dyn Tool>, ToolBuildError> {
    let kind =
        ToolKind::parse(&spec.kind).ok_or_else(|| ToolBuildError::UnknownKind(spec.kind.clone()))?;
    let tool: Arc<dyn Tool> = match kind {
        ToolKind::GithubSearch => Arc::new(GitHubSearchTool::from_spec(spec)),
        ToolKind::WeatherCurrent => Arc::new(WeatherCurrentTool::from_spec(spec)),
        ToolKind::LlmGenerate => {
            let client = llm.ok_or_else(|| ToolBuildError::MissingLlmClient(spec.name.clone()))?;
            Arc::new(LlmGenerateTool::from_spec(spec, client.clone(), model))
        }
    };
    Ok(tool)
}

/// Build the registry. An empty tools list registers every built-in.
pub fn build_registry(
    config: &ToolsConfig,
    llm: Option<Arc<dyn LlmClient>>,
    model: &str,
) -> Result<ToolRegistry, ToolBuildError> {
    let mut registry = ToolRegistry::new();
    for spec in &effective_specs(config) {
        let tool = build_tool(spec, llm.as_ref(), model)?;
        registry.register(tool);
    }
    info!(tools = ?registry.names(), "tool registry built");
    Ok(registry)
}

/// The catalog `build_registry` would expose, built without an LLM client.
pub fn tool_catalog(config: &ToolsConfig) -> Result<Vec<ToolMeta>, ToolBuildError> {
    let mut catalog = Vec::new();
    for spec in &effective_specs(config) {
        let kind = ToolKind::parse(&spec.kind)
            .ok_or_else(|| ToolBuildError::UnknownKind(spec.kind.clone()))?;
        let meta = match kind {
            ToolKind::LlmGenerate => LlmGenerateTool::describe(spec),
            _ => build_tool(spec, None, "")?.metadata(),
        };
        catalog.retain(|existing: &ToolMeta| existing.name != meta.name);
        catalog.push(meta);
    }
    catalog.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(catalog)
}

fn effective_specs(config: &ToolsConfig) -> Vec<ToolSpec> {
    if config.tools.is_empty() {
        ToolKind::ALL.iter().map(ToolKind::default_spec).collect()
    } else {
        config.tools.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opspilot_planners::ScriptedLlmClient;
    use serde_json::json;

    fn client() -> Arc<dyn LlmClient> {
        Arc::new(ScriptedLlmClient::default())
    }

    #[test]
    fn test_empty_config_registers_all_builtins() {
        let registry = build_registry(&ToolsConfig::default(), Some(client()), "m").expect("registry");
        assert_eq!(
            registry.names(),
            vec!["github_search", "llm_generate", "weather_current"]
        );
        let catalog = registry.catalog();
        assert!(catalog.iter().all(|meta| !meta.input_schema.is_null()));
    }

    #[test]
    fn test_configured_subset_and_names() {
        let config = ToolsConfig {
            tools: vec![ToolSpec {
                name: "city_weather".to_string(),
                kind: "weather_current".to_string(),
                description: None,
                config: json!({"timeout_ms": 5000}),
            }],
        };
        let registry = build_registry(&config, None, "m").expect("registry");
        assert_eq!(registry.names(), vec!["city_weather"]);
    }

    #[test]
    fn test_build_errors() {
        let unknown = ToolSpec {
            name: "stocks".to_string(),
            kind: "stock_quote".to_string(),
            description: None,
            config: Value::Null,
        };
        assert!(matches!(
            build_tool(&unknown, None, "m"),
            Err(ToolBuildError::UnknownKind(kind)) if kind == "stock_quote"
        ));

        let err = build_registry(&ToolsConfig::default(), None, "m").err();
        assert!(matches!(err, Some(ToolBuildError::MissingLlmClient(name)) if name == "llm_generate"));
    }

    #[test]
    fn test_catalog_needs_no_llm_client() {
        let catalog = tool_catalog(&ToolsConfig::default()).expect("catalog");
        let registry = build_registry(&ToolsConfig::default(), Some(client()), "m").expect("registry");
        assert_eq!(catalog, registry.catalog());

        let config = ToolsConfig {
            tools: vec![ToolSpec {
                name: "stocks".to_string(),
                kind: "stock_quote".to_string(),
                description: None,
                config: Value::Null,
            }],
        };
        assert!(matches!(tool_catalog(&config), Err(ToolBuildError::UnknownKind(_))));
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ToolKind::parse("shell"), None);
    }
}
