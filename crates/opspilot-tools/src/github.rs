use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use opspilot_config::ToolSpec;
use opspilot_core::tool::{Tool, ToolError, ToolMeta};

use crate::common::{
    arg_string, arg_u64, config_string, config_u64, get_json, http_client,
    DEFAULT_HTTP_TIMEOUT_MS,
};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";
const DEFAULT_TOP_N: u64 = 5;
/// GitHub caps `per_page` at 100.
const MAX_TOP_N: u64 = 100;
const SUMMARY_ITEMS: usize = 3;

/// Repository search ranked by stars.
pub struct GitHubSearchTool {
    name: String,
    description: String,
    api_base: String,
    token_env: String,
    default_top_n: u64,
    timeout_ms: u64,
    client: reqwest::Client,
}

impl GitHubSearchTool {
    pub fn new() -> Self {
        Self::from_spec(&ToolSpec {
            name: "github_search".to_string(),
            kind: "github_search".to_string(),
            description: None,
            config: Value::Null,
        })
    }

    pub fn from_spec(spec: &ToolSpec) -> Self {
        let timeout_ms = config_u64(&spec.config, "timeout_ms").unwrap_or(DEFAULT_HTTP_TIMEOUT_MS);
        Self {
            name: spec.name.clone(),
            description: spec.description_or("Search GitHub repositories by keyword."),
            api_base: config_string(&spec.config, "api_base")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            token_env: config_string(&spec.config, "token_env")
                .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string()),
            default_top_n: config_u64(&spec.config, "default_top_n")
                .unwrap_or(DEFAULT_TOP_N)
                .clamp(1, MAX_TOP_N),
            timeout_ms,
            client: http_client(timeout_ms),
        }
    }

    fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

impl Default for GitHubSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim the search API response down to what callers read.
pub(crate) fn shape_search_output(query: &str, top_n: usize, data: &Value, source_url: &str) -> Value {
    let items: Vec<Value> = data
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(top_n)
                .map(|item| {
                    json!({
                        "name": item.get("name").cloned().unwrap_or(Value::Null),
                        "full_name": item.get("full_name").cloned().unwrap_or(Value::Null),
                        "url": item.get("html_url").cloned().unwrap_or(Value::Null),
                        "stars": item.get("stargazers_count").cloned().unwrap_or(Value::Null),
                        "description": item.get("description").cloned().unwrap_or(Value::Null),
                        "language": item.get("language").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "query": query,
        "total_count": data.get("total_count").cloned().unwrap_or(Value::Null),
        "items": items,
        "source_url": source_url,
    })
}

#[async_trait]
impl Tool for GitHubSearchTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description())
            .with_input_schema(json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {"type": "string", "description": "search keywords"},
                    "top_n": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "number of repositories to return",
                        "default": self.default_top_n
                    }
                }
            }))
            .with_output_schema(json!({
                "type": "object",
                "required": ["query", "items", "source_url"],
                "properties": {
                    "query": {"type": "string"},
                    "total_count": {"type": ["integer", "null"]},
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "full_name": {"type": ["string", "null"]},
                                "url": {"type": ["string", "null"]},
                                "stars": {"type": ["integer", "null"]}
                            }
                        }
                    },
                    "source_url": {"type": "string"}
                }
            }))
            .with_keywords(["github", "repo", "repos", "repository", "repositories", "stars"])
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let query = arg_string(arguments, "query")
            .ok_or_else(|| ToolError::InvalidArguments("missing 'query'".to_string()))?;
        let top_n = arg_u64(arguments, "top_n")
            .unwrap_or(self.default_top_n)
            .clamp(1, MAX_TOP_N);

        let per_page = top_n.to_string();
        let mut request = self
            .client
            .get(format!("{}/search/repositories", self.api_base))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .query(&[
                ("q", query.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ]);
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }

        let (data, source_url) = get_json(request, self.timeout_ms).await?;
        let output = shape_search_output(&query, top_n as usize, &data, &source_url);
        debug!(
            tool = %self.name,
            query = %query,
            items = output["items"].as_array().map(Vec::len).unwrap_or(0),
            "github search finished"
        );
        Ok(output)
    }

    fn summarize(&self, output: &Value) -> Option<String> {
        let items = output.get("items")?.as_array()?;
        if items.is_empty() {
            let query = output.get("query").and_then(Value::as_str).unwrap_or("");
            return Some(format!("No repositories found for '{}'.", query));
        }
        let listed: Vec<String> = items
            .iter()
            .take(SUMMARY_ITEMS)
            .map(|item| {
                let name = item
                    .get("full_name")
                    .and_then(Value::as_str)
                    .or_else(|| item.get("name").and_then(Value::as_str))
                    .unwrap_or("unknown");
                let url = item.get("url").and_then(Value::as_str).unwrap_or("");
                let stars = crate::common::number_text(item.get("stars").unwrap_or(&Value::Null));
                format!("{} ({}, {}★)", name, url, stars)
            })
            .collect();
        Some(format!("Top repositories: {}.", listed.join("; ")))
    }
}
