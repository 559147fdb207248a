//! # Opspilot Tools
//!
//! Built-in tools for opspilot:
//! - `github_search`: top repositories by stars
//! - `weather_current`: current conditions for a city (Open-Meteo)
//! - `llm_generate`: free-form text from the configured LLM
//!
//! Tools are built from `ToolsConfig` by the factory and registered in an
//! immutable `ToolRegistry`.

mod common;
mod factory;
mod generate;
mod github;
mod weather;

pub use opspilot_core::tool::{Tool, ToolError, ToolMeta, ToolRegistry};

pub use factory::{build_registry, build_tool, tool_catalog, ToolBuildError, ToolKind};
pub use generate::LlmGenerateTool;
pub use github::GitHubSearchTool;
pub use weather::{weather_summary, WeatherCurrentTool};
