use std::fmt::Write;

use async_trait::async_trait;

use opspilot_core::executor::{ExecutionProgressEvent, ExecutionProgressReporter};
use opspilot_core::schema;
use opspilot_core::tool::ToolMeta;
use opspilot_core::types::{Plan, StepStatus, StructuredResponse};
use opspilot_runtime::FailureReport;

/// Prints executor progress to stderr.
pub struct StderrProgress;

#[async_trait]
impl ExecutionProgressReporter for StderrProgress {
    async fn report(&self, event: ExecutionProgressEvent) -> Result<(), String> {
        match event.message {
            Some(message) => eprintln!(
                "  [#{} {}] {}: {}",
                event.step_id, event.tool, event.phase, message
            ),
            None => eprintln!("  [#{} {}] {}", event.step_id, event.tool, event.phase),
        }
        Ok(())
    }
}

pub fn render_failure(report: &FailureReport) -> String {
    format!(
        "[{}] {}",
        report.stage.as_str().to_ascii_uppercase(),
        report.message
    )
}

pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Goal: {}", plan.goal);
    for step in &plan.steps {
        let args = serde_json::Value::Object(step.arguments.clone());
        let mode = if step.parallel { "parallel" } else { "sequential" };
        let _ = write!(out, "  #{} {} {} [{}]", step.id, step.tool, args, mode);
        if !step.purpose.is_empty() {
            let _ = write!(out, " - {}", step.purpose);
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

pub fn render_catalog(catalog: &[ToolMeta]) -> String {
    let mut out = String::new();
    for meta in catalog {
        let _ = writeln!(out, "{}: {}", meta.name, meta.description);
        let required = schema::required_fields(&meta.input_schema);
        if let Some(properties) = schema::properties(&meta.input_schema) {
            for (key, property) in properties {
                let flag = if required.contains(&key.as_str()) {
                    "required"
                } else {
                    "optional"
                };
                let _ = writeln!(out, "  - {} ({}, {})", key, schema::type_hint(property), flag);
            }
        }
    }
    out.trim_end().to_string()
}

pub fn render_response(response: &StructuredResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}\n", response.answer);
    let _ = writeln!(
        out,
        "Completeness: {} - {}",
        response.verdict.completeness, response.verdict.rationale
    );
    if !response.verdict.limitations.is_empty() {
        out.push_str("Limitations:\n");
        for limitation in &response.verdict.limitations {
            let _ = writeln!(out, "  - {}", limitation);
        }
    }
    if !response.sources.is_empty() {
        out.push_str("Sources:\n");
        for source in &response.sources {
            let _ = writeln!(out, "  - {}", source);
        }
    }
    out.push_str("Steps:\n");
    for result in response.results.iter() {
        let status = match result.status {
            StepStatus::Success => "ok".to_string(),
            StepStatus::Failed => format!(
                "failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ),
        };
        let _ = writeln!(
            out,
            "  #{} {} {} ({} attempt(s), {} ms)",
            result.step_id,
            result.tool,
            status,
            result.attempts,
            result.duration_ms()
        );
    }
    if let Some(trace) = &response.replan {
        let _ = writeln!(
            out,
            "Replanned after a {} first pass: {}",
            trace.previous_verdict.completeness, trace.feedback
        );
        if !trace.carried_forward.is_empty() {
            let _ = writeln!(
                out,
                "Kept first-pass results from: {}",
                trace.carried_forward.join(", ")
            );
        }
    }
    let _ = write!(
        out,
        "Request {} took {} ms ({} ms in tools)",
        response.request_id, response.total_duration_ms, response.metrics.tool_execution_ms
    );
    out
}
