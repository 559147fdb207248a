use super::*;
use crate::tool::ToolMeta;
use async_trait::async_trait;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct StaticTool {
    name: String,
    output: Value,
}

impl StaticTool {
    fn new(name: &str, output: Value) -> Arc<dyn Tool> {
        Arc::new(Self {
            name: name.to_string(),
            output,
        })
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "returns a fixed value"
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        Ok(self.output.clone())
    }
}

/// Fails `failures_left` times, then succeeds. Each call sleeps `delay_ms`.
struct FlakyTool {
    failures_left: AtomicUsize,
    calls: Arc<AtomicUsize>,
    delay_ms: u64,
}

impl FlakyTool {
    fn new(failures: usize, calls: Arc<AtomicUsize>, delay_ms: u64) -> Arc<dyn Tool> {
        Arc::new(Self {
            failures_left: AtomicUsize::new(failures),
            calls,
            delay_ms,
        })
    }
}

#[async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "fails a fixed number of times"
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            sleep(Duration::from_millis(self.delay_ms)).await;
        }
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(ToolError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(json!({"ok": true}))
    }
}

/// Tracks how many invocations overlap.
struct ConcurrencyTracker {
    name: String,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    delay_ms: u64,
}

#[async_trait]
impl Tool for ConcurrencyTracker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "measures overlap"
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        sleep(Duration::from_millis(self.delay_ms)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({"name": self.name}))
    }
}

/// Appends `start:<label>` / `end:<label>` to a shared log.
struct RecordingTool {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        "record"
    }

    fn description(&self) -> &str {
        "records call order"
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let label = arguments
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        let delay = arguments.get("delay_ms").and_then(Value::as_u64).unwrap_or(5);
        self.log.lock().unwrap().push(format!("start:{}", label));
        sleep(Duration::from_millis(delay)).await;
        self.log.lock().unwrap().push(format!("end:{}", label));
        Ok(json!({"label": label}))
    }
}

struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "never answers in time"
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        sleep(Duration::from_secs(5)).await;
        Ok(json!({}))
    }
}

struct TypedTool;

#[async_trait]
impl Tool for TypedTool {
    fn name(&self) -> &str {
        "typed"
    }

    fn description(&self) -> &str {
        "declares an output schema it does not honour"
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description()).with_output_schema(json!({
            "type": "object",
            "required": ["items"]
        }))
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        Ok(json!({"total": 0}))
    }
}

struct RecordingReporter {
    phases: Mutex<Vec<(usize, String)>>,
}

#[async_trait]
impl ExecutionProgressReporter for RecordingReporter {
    async fn report(&self, event: ExecutionProgressEvent) -> Result<(), String> {
        self.phases
            .lock()
            .unwrap()
            .push((event.step_id, event.phase));
        Ok(())
    }
}

fn executor_with(tools: Vec<Arc<dyn Tool>>) -> Executor {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    Executor::new(Arc::new(registry)).with_retry_delay(Duration::ZERO)
}

fn position_of(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("missing log entry {}", entry))
}

#[test]
fn test_results_match_plan_order_and_length() {
    tokio_test::block_on(async {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = executor_with(vec![Arc::new(RecordingTool { log: log.clone() }) as Arc<dyn Tool>]);
        // Later steps finish first.
        let steps = [40u64, 20, 1]
            .iter()
            .enumerate()
            .map(|(i, delay)| {
                Step::new(i, "record")
                    .with_arg("label", json!(i.to_string()))
                    .with_arg("delay_ms", json!(delay))
            })
            .collect();
        let plan = Plan::new("order", steps);

        let results = executor.execute(&plan).await.expect("execute");

        assert_eq!(results.len(), plan.len());
        for (idx, result) in results.iter().enumerate() {
            assert_eq!(result.step_id, idx);
            assert_eq!(result.output, Some(json!({"label": idx.to_string()})));
        }
        let log = log.lock().unwrap().clone();
        assert!(position_of(&log, "end:2") < position_of(&log, "end:0"));
    });
}

#[test]
fn test_fail_once_then_succeed_counts_retry_time() {
    tokio_test::block_on(async {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(vec![FlakyTool::new(1, calls.clone(), 20)]);
        let plan = Plan::new("retry", vec![Step::new(0, "flaky")]);

        let results = executor.execute(&plan).await.expect("execute");

        let result = results.get(0).expect("result");
        assert!(result.is_success());
        assert_eq!(result.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(result.duration >= Duration::from_millis(40));
    });
}

#[test]
fn test_fail_twice_records_failure_without_erroring() {
    tokio_test::block_on(async {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(vec![
            FlakyTool::new(5, calls.clone(), 0),
            StaticTool::new("static", json!({"v": 1})),
        ]);
        let plan = Plan::new(
            "fail",
            vec![Step::new(0, "flaky"), Step::new(1, "static")],
        );

        let results = executor.execute(&plan).await.expect("execute");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let failed = results.get(0).expect("result");
        assert!(failed.is_failed());
        assert_eq!(failed.attempts, 2);
        assert!(failed
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("status 503"));
        assert!(results.get(1).expect("result").is_success());
    });
}

#[test]
fn test_parallel_run_dispatches_concurrently() {
    tokio_test::block_on(async {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tools: Vec<Arc<dyn Tool>> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                Arc::new(ConcurrencyTracker {
                    name: name.to_string(),
                    active: active.clone(),
                    peak: peak.clone(),
                    delay_ms: 30,
                }) as Arc<dyn Tool>
            })
            .collect();
        let executor = executor_with(tools);
        let plan = Plan::new(
            "fan-out",
            vec![Step::new(0, "a"), Step::new(1, "b"), Step::new(2, "c")],
        );

        let results = executor.execute(&plan).await.expect("execute");

        assert_eq!(results.successful().count(), 3);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    });
}

#[test]
fn test_sequential_step_waits_for_prior_and_blocks_later() {
    tokio_test::block_on(async {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = executor_with(vec![Arc::new(RecordingTool { log: log.clone() }) as Arc<dyn Tool>]);
        let step = |id: usize, label: &str| {
            Step::new(id, "record")
                .with_arg("label", json!(label))
                .with_arg("delay_ms", json!(10))
        };
        let plan = Plan::new(
            "barrier",
            vec![
                step(0, "p0"),
                step(1, "p1"),
                step(2, "s2").sequential(),
                step(3, "p3"),
            ],
        );

        executor.execute(&plan).await.expect("execute");

        let log = log.lock().unwrap().clone();
        let start_s2 = position_of(&log, "start:s2");
        assert!(position_of(&log, "end:p0") < start_s2);
        assert!(position_of(&log, "end:p1") < start_s2);
        assert!(position_of(&log, "end:s2") < position_of(&log, "start:p3"));
    });
}

#[test]
fn test_unknown_tool_is_contract_error() {
    tokio_test::block_on(async {
        let executor = executor_with(vec![StaticTool::new("static", json!({}))]);
        let plan = Plan::new("bad", vec![Step::new(0, "static"), Step::new(1, "ghost")]);

        let err = executor.execute(&plan).await.expect_err("unknown tool");
        assert_eq!(
            err,
            ExecutionError::UnknownTool {
                step_id: 1,
                tool: "ghost".to_string()
            }
        );
    });
}

#[test]
fn test_non_positional_ids_are_rejected() {
    tokio_test::block_on(async {
        let executor = executor_with(vec![StaticTool::new("static", json!({}))]);
        let plan = Plan::new("bad", vec![Step::new(3, "static")]);

        let err = executor.execute(&plan).await.expect_err("id mismatch");
        assert_eq!(err, ExecutionError::StepIdMismatch { position: 0, found: 3 });
    });
}

#[test]
fn test_hung_tool_times_out_and_fails() {
    tokio_test::block_on(async {
        let executor = executor_with(vec![Arc::new(SlowTool) as Arc<dyn Tool>])
            .with_step_timeout(Duration::from_millis(20));
        let plan = Plan::new("slow", vec![Step::new(0, "slow")]);

        let results = executor.execute(&plan).await.expect("execute");

        let result = results.get(0).expect("result");
        assert!(result.is_failed());
        assert_eq!(result.attempts, 2);
        assert!(result.error.as_deref().unwrap_or_default().contains("timed out"));
    });
}

#[test]
fn test_output_schema_violation_fails_step() {
    tokio_test::block_on(async {
        let executor = executor_with(vec![Arc::new(TypedTool) as Arc<dyn Tool>]);
        let plan = Plan::new("typed", vec![Step::new(0, "typed")]);

        let results = executor.execute(&plan).await.expect("execute");

        let result = results.get(0).expect("result");
        assert!(result.is_failed());
        assert!(result
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("missing required field 'items'"));
    });
}

#[test]
fn test_retry_failed_reruns_only_failed_steps_once() {
    tokio_test::block_on(async {
        let calls = Arc::new(AtomicUsize::new(0));
        // Fails both executor attempts, succeeds on the re-dispatch.
        let executor = executor_with(vec![
            FlakyTool::new(2, calls.clone(), 0),
            StaticTool::new("static", json!({"v": 1})),
        ]);
        let plan = Plan::new(
            "rerun",
            vec![Step::new(0, "static"), Step::new(1, "flaky")],
        );

        let first = executor.execute(&plan).await.expect("execute");
        assert_eq!(first.failed_ids(), vec![1]);

        let second = executor.retry_failed(&plan, &first).await.expect("rerun");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(second.get(0), first.get(0));
        let rerun = second.get(1).expect("result");
        assert!(rerun.is_success());
        assert_eq!(rerun.attempts, 3);
        assert!(rerun.error.is_none());
    });
}

#[test]
fn test_retry_failed_rejects_mismatched_results() {
    tokio_test::block_on(async {
        let executor = executor_with(vec![StaticTool::new("static", json!({}))]);
        let plan = Plan::new("p", vec![Step::new(0, "static")]);

        let err = executor
            .retry_failed(&plan, &ExecutionResults::default())
            .await
            .expect_err("mismatch");
        assert_eq!(
            err,
            ExecutionError::ResultsMismatch {
                expected: 1,
                actual: 0
            }
        );
    });
}

#[test]
fn test_progress_reporter_receives_step_lifecycle_events() {
    tokio_test::block_on(async {
        let reporter = Arc::new(RecordingReporter {
            phases: Mutex::new(Vec::new()),
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(vec![FlakyTool::new(1, calls, 0)])
            .with_progress_reporter(reporter.clone());
        let plan = Plan::new("progress", vec![Step::new(0, "flaky")]);

        executor.execute(&plan).await.expect("execute");

        let phases: Vec<String> = reporter
            .phases
            .lock()
            .unwrap()
            .iter()
            .map(|(_, phase)| phase.clone())
            .collect();
        assert_eq!(phases, vec!["step_started", "step_retrying", "step_completed"]);
    });
}

#[test]
fn test_truncate_for_log_marks_cut() {
    let out = truncate_for_log("abcdef", 3);
    assert_eq!(out, "abc... [truncated, total_chars=6]");
    assert_eq!(truncate_for_log("abc", 3), "abc");
}
