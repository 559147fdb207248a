//! LLM endpoint configuration.
//!
//! Environment variables take precedence over the file so a checked-in
//! config can be pointed at another provider without edits.

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const BASE_URL_ENVS: [&str; 2] = ["LLM_BASE_URL", "OPENAI_BASE_URL"];
const MODEL_ENVS: [&str; 2] = ["LLM_MODEL", "OPENAI_MODEL"];
const FALLBACK_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error, PartialEq)]
pub enum ApiKeyError {
    #[error("API key not found in env var '{0}' or 'OPENAI_API_KEY'")]
    EnvNotFound(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint, e.g. `https://api.openai.com/v1`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_tokens: None,
        }
    }
}

fn default_api_key_env() -> String {
    "LLM_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl LlmConfig {
    pub fn resolve_base_url(&self) -> String {
        self.resolve_base_url_with(process_env)
    }

    pub fn resolve_model(&self) -> String {
        self.resolve_model_with(process_env)
    }

    pub fn resolve_api_key(&self) -> Result<String, ApiKeyError> {
        self.resolve_api_key_with(process_env)
    }

    pub fn resolve_base_url_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        BASE_URL_ENVS
            .into_iter()
            .find_map(|name| env(name))
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Groq endpoints default to a Llama model, everything else to gpt-4o-mini.
    pub fn resolve_model_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        if let Some(model) = MODEL_ENVS.into_iter().find_map(|name| env(name)) {
            return model;
        }
        if let Some(model) = &self.model {
            return model.clone();
        }
        if self.resolve_base_url_with(&env).contains("api.groq.com") {
            DEFAULT_GROQ_MODEL.to_string()
        } else {
            DEFAULT_OPENAI_MODEL.to_string()
        }
    }

    pub fn resolve_api_key_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ApiKeyError> {
        env(&self.api_key_env)
            .or_else(|| env(FALLBACK_API_KEY_ENV))
            .ok_or_else(|| ApiKeyError::EnvNotFound(self.api_key_env.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_point_at_groq() {
        let config = LlmConfig::default();
        let env = env_of(&[]);
        assert_eq!(config.resolve_base_url_with(&env), DEFAULT_BASE_URL);
        assert_eq!(config.resolve_model_with(&env), DEFAULT_GROQ_MODEL);
    }

    #[test]
    fn test_env_overrides_file() {
        let config = LlmConfig {
            base_url: Some("https://example.test/v1".to_string()),
            model: Some("file-model".to_string()),
            ..LlmConfig::default()
        };
        let env = env_of(&[
            ("OPENAI_BASE_URL", "https://api.openai.com/v1/"),
            ("OPENAI_MODEL", "gpt-4o"),
        ]);
        assert_eq!(config.resolve_base_url_with(&env), "https://api.openai.com/v1");
        assert_eq!(config.resolve_model_with(&env), "gpt-4o");

        let none = env_of(&[]);
        assert_eq!(config.resolve_base_url_with(&none), "https://example.test/v1");
        assert_eq!(config.resolve_model_with(&none), "file-model");
    }

    #[test]
    fn test_non_groq_endpoint_defaults_to_openai_model() {
        let config = LlmConfig {
            base_url: Some("https://api.openai.com/v1".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.resolve_model_with(env_of(&[])), DEFAULT_OPENAI_MODEL);
    }

    #[test]
    fn test_api_key_falls_back_to_openai_env() {
        let config = LlmConfig::default();
        assert_eq!(
            config.resolve_api_key_with(env_of(&[("OPENAI_API_KEY", "sk-1")])),
            Ok("sk-1".to_string())
        );
        assert_eq!(
            config.resolve_api_key_with(env_of(&[("LLM_API_KEY", "k"), ("OPENAI_API_KEY", "x")])),
            Ok("k".to_string())
        );
        assert_eq!(
            config.resolve_api_key_with(env_of(&[])),
            Err(ApiKeyError::EnvNotFound("LLM_API_KEY".to_string()))
        );
    }
}
