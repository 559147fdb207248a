//! Build an LLM client from config.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use opspilot_config::{ApiKeyError, LlmConfig};

use crate::client::{HttpLlmClient, HttpLlmClientConfig, LlmClient, LlmError};

#[derive(Debug, Error)]
pub enum LlmBuildError {
    #[error("missing api key: {0}")]
    MissingApiKey(#[from] ApiKeyError),
    #[error("failed to build llm client: {0}")]
    Client(LlmError),
}

/// Resolve endpoint and key (env first, then config) and build the HTTP client.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmBuildError> {
    let api_key = config.resolve_api_key()?;
    let client_config = HttpLlmClientConfig {
        base_url: config.resolve_base_url(),
        api_key: Some(api_key),
        timeout_secs: config.timeout_secs,
        max_tokens: config.max_tokens,
        ..HttpLlmClientConfig::default()
    };
    info!(
        base_url = %client_config.base_url,
        timeout_secs = client_config.timeout_secs,
        "llm client configured"
    );
    let client = HttpLlmClient::new(client_config).map_err(LlmBuildError::Client)?;
    Ok(Arc::new(client))
}
