use std::fmt::Write;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use opspilot_core::normalizer::PlanNormalizer;
use opspilot_core::planner::{parse_plan, Planner, PlanningError, ReplanRequest};
use opspilot_core::tool::ToolMeta;
use opspilot_core::truncate_for_log;
use opspilot_core::types::Plan;

use crate::catalog::render_tool_catalog;
use crate::client::{LlmClient, LlmError, LlmRequest};

const MAX_PROMPT_LOG_CHARS: usize = 4_000;
const MAX_LLM_OUTPUT_LOG_CHARS: usize = 8_000;

const PLAN_SHAPE: &str = r#"{"goal":"string","steps":[{"id":"string","tool":"tool name from the catalog","args":{},"parallel":true,"purpose":"string"}]}"#;

/// Planner config for LLM
#[derive(Debug, Clone)]
pub struct LlmPlannerConfig {
    pub model: String,
    pub temperature: f32,
    pub max_steps: usize,
    /// Extra attempts after malformed or invalid output.
    pub max_parse_retries: u32,
    pub system_prompt: String,
    /// Per-call timeout around the LLM client.
    pub timeout_ms: u64,
}

impl Default for LlmPlannerConfig {
    fn default() -> Self {
        Self {
            model: opspilot_config::DEFAULT_GROQ_MODEL.to_string(),
            temperature: 0.2,
            max_steps: opspilot_core::normalizer::DEFAULT_MAX_STEPS,
            max_parse_retries: 2,
            system_prompt: "You are the Planner agent for an AI operations assistant. \
                Convert the user's task into a step-by-step JSON plan. \
                Only use the available tools. Output valid JSON only."
                .to_string(),
            timeout_ms: 60_000,
        }
    }
}

/// LLM-based planner
pub struct LlmPlanner<C: LlmClient> {
    pub client: C,
    pub config: LlmPlannerConfig,
}

impl<C: LlmClient> LlmPlanner<C> {
    pub fn new(client: C, config: LlmPlannerConfig) -> Self {
        Self { client, config }
    }

    fn build_system_prompt(&self, catalog: &[ToolMeta]) -> String {
        let mut system = String::new();
        system.push_str(self.config.system_prompt.trim());
        system.push_str("\n\nPlanning Rules:\n");
        let _ = writeln!(
            system,
            "1) Use 1-{} steps; prefer the minimum needed to answer the task.",
            self.config.max_steps
        );
        system.push_str("2) Each step maps to exactly one tool from the Tool Catalog.\n");
        system.push_str("3) Do not repeat the same tool with identical args.\n");
        system.push_str("4) args must use the tool's argument names and correct JSON types (numbers as numbers).\n");
        system.push_str("5) Set parallel=false only when a step must wait for every earlier step.\n");
        system.push_str("6) If the task is a general writing request, use llm_generate.\n");
        system.push_str("7) Only use GitHub or weather tools when the task needs them.\n");
        system.push_str("8) Return ONLY one JSON object, no prose.\n");
        system.push_str("\nTool Catalog:\n");
        render_tool_catalog(&mut system, catalog);
        system
    }

    fn build_user_prompt(&self, task: &str) -> String {
        let mut user = String::new();
        let _ = writeln!(user, "Task: {}\n", task.trim());
        user.push_str("Return a JSON object with shape:\n");
        user.push_str(PLAN_SHAPE);
        user.push('\n');
        user
    }

    fn build_replan_prompt(&self, request: &ReplanRequest<'_>) -> String {
        let mut user = String::new();
        let _ = writeln!(user, "Task: {}\n", request.task.trim());
        user.push_str("Previous attempt:\n");
        for step in &request.previous_plan.steps {
            let args = serde_json::Value::Object(step.arguments.clone());
            let outcome = match request.previous_results.get(step.id) {
                Some(result) if result.is_success() => "succeeded".to_string(),
                Some(result) => format!(
                    "failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                ),
                None => "not run".to_string(),
            };
            let _ = writeln!(user, "- #{} {} {} -> {}", step.id, step.tool, args, outcome);
        }
        let _ = writeln!(user, "\nFeedback: {}\n", request.feedback.trim());
        user.push_str(
            "Fix missing or failed info from the previous attempt. Use only the necessary tools. \
             Do not start over: plan only what closes the gap.\n",
        );
        user.push_str("Return a JSON object with shape:\n");
        user.push_str(PLAN_SHAPE);
        user.push('\n');
        user
    }

    async fn ask(&self, system: String, user: String) -> Result<String, PlanningError> {
        tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms),
            self.client.complete(LlmRequest {
                system,
                user,
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                json_mode: true,
            }),
        )
        .await
        .map_err(|_| PlanningError::Timeout(self.config.timeout_ms))?
        .map_err(|err| match err {
            LlmError::Timeout(ms) => PlanningError::Timeout(ms),
            other => PlanningError::Llm(other.to_string()),
        })
    }

    /// Ask for a plan until one parses and validates, within the retry budget.
    async fn generate(
        &self,
        task: &str,
        user: String,
        catalog: &[ToolMeta],
    ) -> Result<Plan, PlanningError> {
        let system = self.build_system_prompt(catalog);
        let normalizer = PlanNormalizer::new(catalog).with_max_steps(self.config.max_steps);
        let max_attempts = self.config.max_parse_retries.saturating_add(1);
        let mut last_error = String::new();

        info!(
            model = %self.config.model,
            temperature = self.config.temperature,
            tool_count = catalog.len(),
            max_attempts,
            "planner request prepared"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                system_prompt = %truncate_for_log(&system, MAX_PROMPT_LOG_CHARS),
                user_prompt = %truncate_for_log(&user, MAX_PROMPT_LOG_CHARS),
                "planner prompts"
            );
        }

        for attempt in 1..=max_attempts {
            let mut prompt = user.clone();
            if attempt > 1 {
                let _ = write!(
                    prompt,
                    "\nYour previous reply was rejected: {}\nReturn a corrected JSON object only.\n",
                    last_error
                );
            }
            let output = self.ask(system.clone(), prompt).await?;
            if tracing::enabled!(tracing::Level::DEBUG) {
                debug!(
                    attempt,
                    llm_output = %truncate_for_log(&output, MAX_LLM_OUTPUT_LOG_CHARS),
                    "planner raw llm output"
                );
            }

            let checked = parse_plan(&output)
                .map_err(|err| err.to_string())
                .and_then(|plan| normalizer.normalize(plan, task).map_err(|err| err.to_string()));
            match checked {
                Ok(plan) => {
                    info!(
                        attempt,
                        step_count = plan.len(),
                        tools = ?plan.tools_used(),
                        "planner produced plan"
                    );
                    return Ok(plan);
                }
                Err(reason) => {
                    warn!(attempt, max_attempts, reason = %reason, "planner output rejected");
                    last_error = reason;
                }
            }
        }

        Err(PlanningError::InvalidOutput {
            attempts: max_attempts,
            reason: last_error,
        })
    }
}

#[async_trait]
impl<C: LlmClient> Planner for LlmPlanner<C> {
    async fn plan(&self, task: &str, catalog: &[ToolMeta]) -> Result<Plan, PlanningError> {
        let user = self.build_user_prompt(task);
        self.generate(task, user, catalog).await
    }

    async fn replan(
        &self,
        request: ReplanRequest<'_>,
        catalog: &[ToolMeta],
    ) -> Result<Plan, PlanningError> {
        info!(
            previous_steps = request.previous_plan.len(),
            failed_steps = request.previous_results.failed().count(),
            "replanning with feedback"
        );
        let user = self.build_replan_prompt(&request);
        self.generate(request.task, user, catalog).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedLlmClient;
    use opspilot_core::types::{ExecutionResults, Step, StepResult};
    use serde_json::{json, Map};
    use std::time::Duration;

    fn catalog() -> Vec<ToolMeta> {
        vec![
            ToolMeta::new("github_search", "Search GitHub repositories by keyword.")
                .with_input_schema(json!({
                    "type": "object",
                    "required": ["query"],
                    "properties": {
                        "query": {"type": "string"},
                        "top_n": {"type": "integer"}
                    }
                })),
            ToolMeta::new("weather_current", "Get current weather by city name.")
                .with_input_schema(json!({
                    "type": "object",
                    "required": ["city"],
                    "properties": {"city": {"type": "string"}}
                })),
        ]
    }

    const GOOD_PLAN: &str = r#"{"goal":"repos and weather","steps":[
        {"id":"s1","tool":"github_search","args":{"query":"fastapi","top_n":"3"}},
        {"id":"s2","tool":"weather_current","args":{"city":"Mumbai"}}]}"#;

    fn planner(client: ScriptedLlmClient) -> LlmPlanner<ScriptedLlmClient> {
        LlmPlanner::new(client, LlmPlannerConfig::default())
    }

    #[test]
    fn test_plan_builds_prompt_with_task_and_catalog() {
        tokio_test::block_on(async {
            let planner = planner(ScriptedLlmClient::new([GOOD_PLAN]));
            let plan = planner
                .plan("Find top 3 FastAPI repositories and weather in Mumbai", &catalog())
                .await
                .expect("plan");

            assert_eq!(plan.tools_used(), vec!["github_search", "weather_current"]);
            assert!(plan.steps.iter().all(|s| s.parallel));
            assert_eq!(plan.steps[0].arguments.get("top_n"), Some(&json!(3)));

            let requests = planner.client.requests();
            assert_eq!(requests.len(), 1);
            assert!(requests[0].json_mode);
            assert!(requests[0].system.contains("- name: weather_current"));
            assert!(requests[0].system.contains("Use 1-4 steps"));
            assert!(requests[0].user.contains("Task: Find top 3 FastAPI"));
        });
    }

    #[test]
    fn test_malformed_output_retried_with_feedback() {
        tokio_test::block_on(async {
            let planner = planner(ScriptedLlmClient::new([
                "Sorry, here you go: {not json",
                r#"{"steps":[{"tool":"stock_quote","args":{}}]}"#,
                GOOD_PLAN,
            ]));
            let plan = planner.plan("repos and weather", &catalog()).await.expect("plan");

            assert_eq!(plan.len(), 2);
            let requests = planner.client.requests();
            assert_eq!(requests.len(), 3);
            assert!(!requests[0].user.contains("previous reply was rejected"));
            assert!(requests[1].user.contains("no JSON object found"));
            assert!(requests[2].user.contains("unknown tool 'stock_quote'"));
        });
    }

    #[test]
    fn test_retry_budget_exhaustion_is_planning_error() {
        tokio_test::block_on(async {
            let planner = planner(ScriptedLlmClient::new(["nope", "{}", r#"{"steps":[]}"#]));
            let err = planner
                .plan("anything", &catalog())
                .await
                .expect_err("exhausted");

            assert_eq!(
                err,
                PlanningError::InvalidOutput {
                    attempts: 3,
                    reason: "empty plan".to_string()
                }
            );
            assert_eq!(planner.client.call_count(), 3);
        });
    }

    #[test]
    fn test_llm_failure_is_not_retried() {
        tokio_test::block_on(async {
            let planner = planner(ScriptedLlmClient::from_results([
                Err(LlmError::Http("connection refused".to_string())),
                Ok(GOOD_PLAN.to_string()),
            ]));
            let err = planner.plan("anything", &catalog()).await.expect_err("llm");

            assert!(matches!(err, PlanningError::Llm(msg) if msg.contains("connection refused")));
            assert_eq!(planner.client.call_count(), 1);
        });
    }

    #[test]
    fn test_llm_timeout_maps_to_planning_timeout() {
        tokio_test::block_on(async {
            let planner =
                planner(ScriptedLlmClient::from_results([Err(LlmError::Timeout(60_000))]));
            let err = planner.plan("anything", &catalog()).await.expect_err("timeout");
            assert_eq!(err, PlanningError::Timeout(60_000));
        });
    }

    /// Answers a valid plan, but only after `delay`.
    struct SlowClient {
        delay: Duration,
    }

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
            tokio::time::sleep(self.delay).await;
            Ok(GOOD_PLAN.to_string())
        }
    }

    #[test]
    fn test_slow_llm_call_hits_planner_timeout() {
        tokio_test::block_on(async {
            let planner = LlmPlanner::new(
                SlowClient {
                    delay: Duration::from_millis(500),
                },
                LlmPlannerConfig {
                    timeout_ms: 20,
                    ..LlmPlannerConfig::default()
                },
            );
            let err = planner.plan("repos and weather", &catalog()).await.expect_err("timeout");
            assert_eq!(err, PlanningError::Timeout(20));
        });
    }

    #[test]
    fn test_replan_prompt_carries_previous_outcome_and_feedback() {
        tokio_test::block_on(async {
            let planner = planner(ScriptedLlmClient::new([
                r#"{"steps":[{"tool":"weather_current","args":{"city":"Mumbai"}}]}"#,
            ]));
            let previous_plan = Plan::new(
                "g",
                vec![
                    Step::new(0, "github_search").with_arg("query", json!("fastapi")),
                    Step::new(1, "weather_current").with_arg("city", json!("Mumbay")),
                ],
            );
            let previous_results = ExecutionResults::new(vec![
                StepResult::success(0, "github_search", Map::new(), json!({}), 1, Duration::ZERO),
                StepResult::failed(
                    1,
                    "weather_current",
                    Map::new(),
                    "not found: city 'Mumbay'",
                    3,
                    Duration::ZERO,
                ),
            ]);

            let plan = planner
                .replan(
                    ReplanRequest {
                        task: "repos and weather in Mumbai",
                        previous_plan: &previous_plan,
                        previous_results: &previous_results,
                        feedback: "weather_current failed",
                    },
                    &catalog(),
                )
                .await
                .expect("replan");

            assert_eq!(plan.len(), 1);
            let user = &planner.client.requests()[0].user;
            assert!(user.contains("#0 github_search {\"query\":\"fastapi\"} -> succeeded"));
            assert!(user.contains("-> failed: not found: city 'Mumbay'"));
            assert!(user.contains("Feedback: weather_current failed"));
            assert!(user.contains("Fix missing or failed info"));
        });
    }
}
