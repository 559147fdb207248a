use serde_json::Value;

use crate::tool::ToolRegistry;
use crate::types::ExecutionResults;

/// Build the final answer from successful outputs.
///
/// Tool summaries win over a judge-proposed answer. The result is never
/// empty: with nothing to summarize it lists what went wrong.
pub fn synthesize_answer(
    registry: &ToolRegistry,
    results: &ExecutionResults,
    judge_answer: Option<&str>,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    for result in results.successful() {
        let Some(output) = result.output.as_ref() else {
            continue;
        };
        let summary = registry
            .get(&result.tool)
            .and_then(|tool| tool.summarize(output))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(summary) = summary {
            if !parts.contains(&summary) {
                parts.push(summary);
            }
        }
    }
    if !parts.is_empty() {
        return parts.join(" ");
    }

    if let Some(answer) = judge_answer.map(str::trim).filter(|a| !a.is_empty()) {
        return answer.to_string();
    }

    if results.any_succeeded() {
        let tools: Vec<&str> = results.successful().map(|r| r.tool.as_str()).collect();
        return format!(
            "Completed {} of {} steps ({}), but no summary is available.",
            tools.len(),
            results.len(),
            tools.join(", ")
        );
    }

    let errors: Vec<String> = results
        .failed()
        .map(|r| {
            format!(
                "{} failed: {}",
                r.tool,
                r.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();
    if errors.is_empty() {
        "No steps were executed, so no answer could be produced.".to_string()
    } else {
        format!("No results could be produced. {}.", errors.join("; "))
    }
}

/// `source_url` fields and result-item `url`s from successful outputs,
/// first occurrence order, without duplicates.
pub fn collect_sources(results: &ExecutionResults) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    let mut push = |url: &str| {
        let url = url.trim();
        if !url.is_empty() && !sources.iter().any(|s| s == url) {
            sources.push(url.to_string());
        }
    };
    let mut item_urls: Vec<String> = Vec::new();
    for output in results.successful().filter_map(|r| r.output.as_ref()) {
        if let Some(url) = output.get("source_url").and_then(Value::as_str) {
            push(url);
        }
        if let Some(items) = output.get("items").and_then(Value::as_array) {
            item_urls.extend(
                items
                    .iter()
                    .filter_map(|item| item.get("url").and_then(Value::as_str))
                    .map(str::to_string),
            );
        }
    }
    for url in &item_urls {
        push(url);
    }
    sources
}
