use std::time::Duration;

use serde_json::{Map, Value};

use opspilot_core::tool::ToolError;
use opspilot_core::truncate_for_log;

pub(crate) const DEFAULT_HTTP_TIMEOUT_MS: u64 = 20_000;
pub(crate) const USER_AGENT: &str = concat!("opspilot/", env!("CARGO_PKG_VERSION"));

const MAX_ERROR_BODY_CHARS: usize = 300;

pub(crate) fn config_string(config: &Value, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn config_u64(config: &Value, key: &str) -> Option<u64> {
    config.get(key).and_then(|v| v.as_u64())
}

pub(crate) fn config_f32(config: &Value, key: &str) -> Option<f32> {
    config.get(key).and_then(|v| v.as_f64()).map(|v| v as f32)
}

/// Non-empty string argument.
pub(crate) fn arg_string(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Integer argument, also accepting numeric strings.
pub(crate) fn arg_u64(args: &Map<String, Value>, key: &str) -> Option<u64> {
    match args.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn http_client(timeout_ms: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Send a GET and decode a JSON body. Returns the body and the final URL.
pub(crate) async fn get_json(
    request: reqwest::RequestBuilder,
    timeout_ms: u64,
) -> Result<(Value, String), ToolError> {
    let response = request.send().await.map_err(|err| {
        if err.is_timeout() {
            ToolError::Timeout(timeout_ms)
        } else {
            ToolError::Transport(err.to_string())
        }
    })?;

    let status = response.status();
    let url = response.url().to_string();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ToolError::Status {
            status: status.as_u16(),
            body: truncate_for_log(body.trim(), MAX_ERROR_BODY_CHARS),
        });
    }

    let body = response
        .json::<Value>()
        .await
        .map_err(|err| ToolError::InvalidOutput(format!("response is not JSON: {}", err)))?;
    Ok((body, url))
}

/// Render a JSON number the way people write it (`31`, `12.5`).
pub(crate) fn number_text(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::Null => "?".to_string(),
        other => other.to_string(),
    }
}
