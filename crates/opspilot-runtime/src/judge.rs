use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use opspilot_core::planner::extract_json;
use opspilot_core::truncate_for_log;
use opspilot_core::types::{Completeness, ExecutionResults, Plan};
use opspilot_core::verifier::{CompletenessJudge, JudgeError, JudgeRequest, Judgement};
use opspilot_planners::{LlmClient, LlmError, LlmRequest};

const DEFAULT_JUDGE_PROMPT: &str = "You are the Verifier agent. Validate tool outputs, detect gaps, \
and produce a clean, structured final response. Output valid JSON only.";

const VERDICT_SHAPE: &str = r#"{"completeness":"complete|partial|failed","rationale":"string","final_answer":"string","limitations":["string"],"suggested_refinement":"string or null"}"#;

const MAX_COMPACT_ITEMS: usize = 5;
const MAX_OUTPUT_CHARS: usize = 1_200;
const MAX_LLM_OUTPUT_LOG_CHARS: usize = 4_000;

#[derive(Debug, Clone)]
pub struct LlmJudgeConfig {
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub timeout_ms: u64,
    pub max_parse_retries: u32,
}

impl Default for LlmJudgeConfig {
    fn default() -> Self {
        Self {
            model: opspilot_config::DEFAULT_GROQ_MODEL.to_string(),
            temperature: 0.2,
            system_prompt: DEFAULT_JUDGE_PROMPT.to_string(),
            timeout_ms: 30_000,
            max_parse_retries: 1,
        }
    }
}

/// Completeness judge backed by the LLM.
pub struct LlmJudge<C: LlmClient> {
    client: C,
    config: LlmJudgeConfig,
}

impl<C: LlmClient> LlmJudge<C> {
    pub fn new(client: C, config: LlmJudgeConfig) -> Self {
        Self { client, config }
    }

    async fn ask(&self, user: String) -> Result<String, JudgeError> {
        tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms),
            self.client.complete(LlmRequest {
                system: self.config.system_prompt.clone(),
                user,
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                json_mode: true,
            }),
        )
        .await
        .map_err(|_| JudgeError::Timeout(self.config.timeout_ms))?
        .map_err(|err| match err {
            LlmError::Timeout(ms) => JudgeError::Timeout(ms),
            other => JudgeError::Llm(other.to_string()),
        })
    }
}

#[async_trait]
impl<C: LlmClient> CompletenessJudge for LlmJudge<C> {
    fn name(&self) -> &str {
        "llm"
    }

    async fn judge(&self, request: JudgeRequest<'_>) -> Result<Judgement, JudgeError> {
        let prompt = build_user_prompt(request.task, request.plan, request.results);
        let max_attempts = self.config.max_parse_retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let mut user = prompt.clone();
            if attempt > 1 {
                user.push_str(&format!(
                    "\n\nYour previous reply was rejected: {}\nReturn a corrected JSON object only.",
                    last_error
                ));
            }
            let raw = self.ask(user).await?;
            debug!(
                attempt,
                llm_output = %truncate_for_log(&raw, MAX_LLM_OUTPUT_LOG_CHARS),
                "judge raw llm output"
            );
            match parse_judgement(&raw) {
                Ok(judgement) => return Ok(judgement),
                Err(reason) => {
                    warn!(attempt, max_attempts, reason = %reason, "judge output rejected");
                    last_error = reason;
                }
            }
        }
        Err(JudgeError::InvalidOutput(last_error))
    }
}

#[derive(Debug, Deserialize)]
struct RawJudgement {
    #[serde(default, alias = "status", alias = "verdict")]
    completeness: Option<String>,
    #[serde(default, alias = "reason", alias = "reasoning")]
    rationale: Option<String>,
    #[serde(default, alias = "answer")]
    final_answer: Option<String>,
    #[serde(default)]
    limitations: Option<Value>,
    #[serde(default)]
    suggested_refinement: Option<String>,
}

fn parse_judgement(raw: &str) -> Result<Judgement, String> {
    let json = extract_json(raw).ok_or_else(|| "no JSON object found in model output".to_string())?;
    let parsed: RawJudgement =
        serde_json::from_str(json).map_err(|err| format!("invalid JSON: {}", err))?;
    let label = parsed
        .completeness
        .ok_or_else(|| "missing 'completeness'".to_string())?;
    let completeness = Completeness::parse_loose(&label)
        .ok_or_else(|| format!("unknown completeness '{}'", label))?;

    let limitations = match parsed.limitations {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };

    let mut judgement = Judgement::new(
        completeness,
        parsed.rationale.unwrap_or_default().trim(),
    );
    judgement.answer = parsed
        .final_answer
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    judgement.limitations = limitations;
    judgement.suggested_refinement = parsed
        .suggested_refinement
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    Ok(judgement)
}

/// Shrink list outputs to a few identifying fields and cap everything else.
fn compact_output(output: &Value) -> Value {
    if let Some(items) = output.get("items").and_then(Value::as_array) {
        let trimmed: Vec<Value> = items
            .iter()
            .take(MAX_COMPACT_ITEMS)
            .map(|item| {
                json!({
                    "name": item.get("name"),
                    "full_name": item.get("full_name"),
                    "url": item.get("url"),
                    "stars": item.get("stars"),
                    "language": item.get("language"),
                })
            })
            .collect();
        return json!({
            "query": output.get("query"),
            "total_count": output.get("total_count"),
            "items": trimmed,
            "source_url": output.get("source_url"),
        });
    }
    let text = output.to_string();
    if text.chars().count() > MAX_OUTPUT_CHARS {
        Value::String(truncate_for_log(&text, MAX_OUTPUT_CHARS))
    } else {
        output.clone()
    }
}

fn build_user_prompt(task: &str, plan: &Plan, results: &ExecutionResults) -> String {
    let steps: Vec<Value> = plan
        .steps
        .iter()
        .map(|step| {
            json!({
                "id": step.id,
                "tool": step.tool,
                "args": step.arguments,
                "parallel": step.parallel,
            })
        })
        .collect();
    let step_results: Vec<Value> = results
        .iter()
        .map(|result| {
            json!({
                "step_id": result.step_id,
                "tool": result.tool,
                "status": result.status,
                "attempts": result.attempts,
                "output": result.output.as_ref().map(compact_output),
                "error": result.error,
            })
        })
        .collect();
    let pretty = |value: &Value| serde_json::to_string_pretty(value).unwrap_or_default();

    format!(
        "Task: {}\n\nPlan:\n{}\n\nStep results:\n{}\n\nReturn a JSON object that matches this shape:\n{}\n\n\
         Guidelines:\n\
         - Use the tool outputs as ground truth.\n\
         - complete: every part of the task is answered by a successful step.\n\
         - partial: some part is missing or a step failed; explain what is missing in rationale and add limitations.\n\
         - failed: nothing useful was produced.\n\
         - suggested_refinement: what a follow-up plan should do, when partial.\n\
         - Do not include any text outside JSON.",
        task.trim(),
        pretty(&json!({"goal": plan.goal, "steps": steps})),
        pretty(&Value::Array(step_results)),
        VERDICT_SHAPE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use opspilot_core::types::{Step, StepResult};
    use opspilot_planners::ScriptedLlmClient;
    use serde_json::Map;

    fn fixture() -> (Plan, ExecutionResults) {
        let plan = Plan::new(
            "repos",
            vec![Step::new(0, "github_search").with_arg("query", json!("fastapi"))],
        );
        let items: Vec<Value> = (0..8)
            .map(|i| json!({"name": format!("r{}", i), "full_name": format!("o/r{}", i), "url": format!("https://github.com/o/r{}", i), "stars": 100 - i, "description": "long text", "language": "Python"}))
            .collect();
        let results = ExecutionResults::new(vec![StepResult::success(
            0,
            "github_search",
            Map::new(),
            json!({"query": "fastapi", "total_count": 8, "items": items, "source_url": "https://api.github.com/x"}),
            1,
            Duration::from_millis(5),
        )]);
        (plan, results)
    }

    fn judge(client: ScriptedLlmClient) -> LlmJudge<ScriptedLlmClient> {
        LlmJudge::new(client, LlmJudgeConfig::default())
    }

    #[test]
    fn test_judge_parses_verdict_and_compacts_results() {
        tokio_test::block_on(async {
            let (plan, results) = fixture();
            let judge = judge(ScriptedLlmClient::new([
                r#"{"completeness": "Complete", "rationale": "all repos listed", "final_answer": "Top repos...", "limitations": [], "sources": []}"#,
            ]));
            let judgement = judge
                .judge(JudgeRequest {
                    task: "top fastapi repos",
                    plan: &plan,
                    results: &results,
                    catalog: &[],
                })
                .await
                .expect("judgement");

            assert_eq!(judgement.completeness, Completeness::Complete);
            assert_eq!(judgement.rationale, "all repos listed");
            assert_eq!(judgement.answer.as_deref(), Some("Top repos..."));

            let requests = judge.client.requests();
            let user = &requests[0].user;
            assert!(requests[0].json_mode);
            assert!(user.contains("Task: top fastapi repos"));
            assert!(user.contains("o/r4"));
            assert!(!user.contains("o/r5"));
            assert!(!user.contains("long text"));
        });
    }

    #[test]
    fn test_judge_retries_unparseable_output() {
        tokio_test::block_on(async {
            let (plan, results) = fixture();
            let judge = judge(ScriptedLlmClient::new([
                r#"{"completeness": "mostly"}"#,
                r#"{"status": "partial", "reason": "stars missing", "limitations": "only 8 repos"}"#,
            ]));
            let judgement = judge
                .judge(JudgeRequest {
                    task: "t",
                    plan: &plan,
                    results: &results,
                    catalog: &[],
                })
                .await
                .expect("judgement");

            assert_eq!(judgement.completeness, Completeness::Partial);
            assert_eq!(judgement.limitations, vec!["only 8 repos".to_string()]);
            assert!(judge.client.requests()[1]
                .user
                .contains("unknown completeness 'mostly'"));
        });
    }

    #[test]
    fn test_judge_gives_up_after_budget() {
        tokio_test::block_on(async {
            let (plan, results) = fixture();
            let judge = judge(ScriptedLlmClient::new(["nope", "still nope"]));
            let err = judge
                .judge(JudgeRequest {
                    task: "t",
                    plan: &plan,
                    results: &results,
                    catalog: &[],
                })
                .await
                .expect_err("invalid");
            assert!(matches!(err, JudgeError::InvalidOutput(_)));
        });
    }

    #[test]
    fn test_judge_maps_llm_errors() {
        tokio_test::block_on(async {
            let (plan, results) = fixture();
            let judge = judge(ScriptedLlmClient::from_results([Err(LlmError::Http(
                "401 unauthorized".to_string(),
            ))]));
            let err = judge
                .judge(JudgeRequest {
                    task: "t",
                    plan: &plan,
                    results: &results,
                    catalog: &[],
                })
                .await
                .expect_err("llm");
            assert!(matches!(err, JudgeError::Llm(msg) if msg.contains("401")));
        });
    }

    #[test]
    fn test_compact_output_truncates_large_text() {
        let long = json!({"text": "x".repeat(5_000)});
        let compacted = compact_output(&long);
        assert!(compacted.is_string());
        assert!(compacted.as_str().map(|s| s.contains("truncated")).unwrap_or(false));

        let small = json!({"location": "Mumbai, India"});
        assert_eq!(compact_output(&small), small);
    }
}
