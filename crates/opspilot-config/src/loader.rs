//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::OpspilotConfig;

const KNOWN_TOOL_KINDS: [&str; 3] = ["github_search", "weather_current", "llm_generate"];
const KNOWN_VERIFIER_MODES: [&str; 2] = ["llm", "heuristic"];

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load and validate configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<OpspilotConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from YAML text.
pub fn parse_config(content: &str) -> Result<OpspilotConfig, ConfigError> {
    let config: OpspilotConfig = if content.trim().is_empty() {
        OpspilotConfig::default()
    } else {
        serde_yaml::from_str(content)?
    };
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &OpspilotConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(invalid("version must be greater than 0"));
    }
    if config.app.name.trim().is_empty() {
        return Err(invalid("app.name must not be empty"));
    }
    if config.planner.max_steps == 0 {
        return Err(invalid("planner.max_steps must be > 0"));
    }
    if !(0.0..=2.0).contains(&config.planner.temperature) {
        return Err(invalid("planner.temperature must be within 0.0..=2.0"));
    }
    if config.planner.timeout_ms == 0 {
        return Err(invalid("planner.timeout_ms must be > 0"));
    }
    if config.executor.step_timeout_ms == 0 {
        return Err(invalid("executor.step_timeout_ms must be > 0"));
    }
    if !KNOWN_VERIFIER_MODES.contains(&config.verifier.mode.as_str()) {
        return Err(ConfigError::Invalid(format!(
            "verifier.mode '{}' must be one of: {}",
            config.verifier.mode,
            KNOWN_VERIFIER_MODES.join(", ")
        )));
    }
    if config.runtime.request_timeout_secs == 0 {
        return Err(invalid("runtime.request_timeout_secs must be > 0"));
    }
    if config.llm.api_key_env.trim().is_empty() {
        return Err(invalid("llm.api_key_env must not be empty"));
    }

    let mut seen = std::collections::HashSet::new();
    for tool in &config.tools.tools {
        if tool.name.trim().is_empty() {
            return Err(invalid("tools[].name must not be empty"));
        }
        if !seen.insert(tool.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate tool name '{}'",
                tool.name
            )));
        }
        if !KNOWN_TOOL_KINDS.contains(&tool.kind.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "tool '{}' has unknown kind '{}'",
                tool.name, tool.kind
            )));
        }
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}
