//! # Opspilot Config
//!
//! Single-file configuration for opspilot.
//! One `opspilot.yaml` configures the LLM endpoint, planner, executor,
//! verifier, replan loop, tools and observability.

mod llm;
mod loader;
mod tools;

pub use llm::{ApiKeyError, LlmConfig, DEFAULT_BASE_URL, DEFAULT_GROQ_MODEL, DEFAULT_OPENAI_MODEL};
pub use loader::{load_config, parse_config, validate_config, ConfigError};
pub use tools::{ToolSpec, ToolsConfig};

use serde::Deserialize;

/// Top-level configuration schema.
#[derive(Debug, Clone, Deserialize)]
pub struct OpspilotConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for OpspilotConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            llm: LlmConfig::default(),
            planner: PlannerConfig::default(),
            executor: ExecutorConfig::default(),
            verifier: VerifierConfig::default(),
            runtime: RuntimeConfig::default(),
            tools: ToolsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_env(),
        }
    }
}

fn default_app_name() -> String {
    "opspilot".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Optional model override for planner calls.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_planner_temperature")]
    pub temperature: f32,
    /// Upper bound on steps in one plan.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Extra attempts after malformed or invalid output.
    #[serde(default = "default_max_parse_retries")]
    pub max_parse_retries: u32,
    /// Per-call LLM timeout.
    #[serde(default = "default_planner_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: default_planner_temperature(),
            max_steps: default_max_steps(),
            max_parse_retries: default_max_parse_retries(),
            timeout_ms: default_planner_timeout_ms(),
        }
    }
}

fn default_planner_temperature() -> f32 {
    0.2
}

fn default_max_steps() -> usize {
    4
}

fn default_max_parse_retries() -> u32 {
    2
}

fn default_planner_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Per-attempt tool timeout.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    /// Pause before the single retry.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: default_step_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_step_timeout_ms() -> u64 {
    20_000
}

fn default_retry_delay_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifierConfig {
    /// `llm` or `heuristic`.
    #[serde(default = "default_verifier_mode")]
    pub mode: String,
    #[serde(default = "default_true")]
    pub rerun_failed: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_planner_temperature")]
    pub temperature: f32,
    #[serde(default = "default_verifier_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mode: default_verifier_mode(),
            rerun_failed: true,
            model: None,
            temperature: default_planner_temperature(),
            timeout_ms: default_verifier_timeout_ms(),
        }
    }
}

fn default_verifier_mode() -> String {
    "llm".to_string()
}

fn default_verifier_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Whole-request deadline.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Replan once when the first verdict is partial.
    #[serde(default = "default_true")]
    pub auto_replan: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            auto_replan: true,
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
