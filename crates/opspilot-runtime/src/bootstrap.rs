use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use thiserror::Error;

use opspilot_config::{load_config, ConfigError, ObservabilityConfig, OpspilotConfig};
use opspilot_core::executor::{ExecutionProgressReporter, Executor};
use opspilot_core::planner::Planner;
use opspilot_core::tool::{ToolMeta, ToolRegistry};
use opspilot_core::verifier::{CompletenessJudge, HeuristicJudge, Verifier};
use opspilot_planners::{build_llm_client, LlmBuildError, LlmClient, LlmPlanner, LlmPlannerConfig};
use opspilot_tools::{build_registry, tool_catalog, ToolBuildError};

use crate::controller::{ControllerConfig, ReplanController};
use crate::judge::{LlmJudge, LlmJudgeConfig};

/// Runtime bootstrap errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("llm client error: {0}")]
    LlmBuild(#[from] LlmBuildError),
    #[error("tool build error: {0}")]
    ToolBuild(#[from] ToolBuildError),
    #[error("unsupported verifier mode: {0}")]
    UnsupportedVerifierMode(String),
}

/// Running app bundle created from one config file.
pub struct RuntimeApp {
    pub config: OpspilotConfig,
    pub controller: ReplanController,
    pub registry: Arc<ToolRegistry>,
}

static TRACING_INIT: OnceLock<()> = OnceLock::new();

impl RuntimeApp {
    /// Create a runnable app from `opspilot.yaml`.
    pub fn from_config_path(path: impl Into<PathBuf>) -> Result<Self, BootstrapError> {
        Self::from_config_path_with_reporter(path, None)
    }

    /// Same as [`RuntimeApp::from_config_path`], streaming executor progress.
    pub fn from_config_path_with_reporter(
        path: impl Into<PathBuf>,
        reporter: Option<Arc<dyn ExecutionProgressReporter>>,
    ) -> Result<Self, BootstrapError> {
        let path = path.into();
        let config = load_config(&path)?;
        init_tracing_if_needed(&config.observability);
        tracing::info!(config = %path.display(), "config loaded");
        Self::from_config(config, reporter)
    }

    /// Wire every component from an already-loaded config.
    pub fn from_config(
        config: OpspilotConfig,
        reporter: Option<Arc<dyn ExecutionProgressReporter>>,
    ) -> Result<Self, BootstrapError> {
        let client = build_llm_client(&config.llm)?;
        Self::from_config_with_client(config, client, reporter)
    }

    /// Wire every component around a given LLM client.
    pub fn from_config_with_client(
        config: OpspilotConfig,
        client: Arc<dyn LlmClient>,
        reporter: Option<Arc<dyn ExecutionProgressReporter>>,
    ) -> Result<Self, BootstrapError> {
        let model = config.llm.resolve_model();
        let registry = Arc::new(build_registry(&config.tools, Some(client.clone()), &model)?);

        let mut executor = Executor::new(registry.clone())
            .with_step_timeout(Duration::from_millis(config.executor.step_timeout_ms))
            .with_retry_delay(Duration::from_millis(config.executor.retry_delay_ms));
        if let Some(reporter) = reporter {
            executor = executor.with_progress_reporter(reporter);
        }
        let executor = Arc::new(executor);

        let judge = build_judge(&config, client.clone(), &model)?;
        let verifier = Arc::new(
            Verifier::new(executor.clone(), judge).with_rerun_failed(config.verifier.rerun_failed),
        );
        let planner = build_planner(&config, client, &model);
        let controller = ReplanController::new(planner, executor, verifier).with_config(
            ControllerConfig {
                request_timeout: Duration::from_secs(config.runtime.request_timeout_secs),
                auto_replan: config.runtime.auto_replan,
            },
        );

        tracing::info!(
            model = %model,
            tools = ?registry.names(),
            verifier = %config.verifier.mode,
            auto_replan = config.runtime.auto_replan,
            "runtime ready"
        );
        Ok(Self {
            config,
            controller,
            registry,
        })
    }
}

/// Tool catalog from a config file. Needs no LLM credentials.
pub fn load_tool_catalog(path: impl AsRef<Path>) -> Result<Vec<ToolMeta>, BootstrapError> {
    let config = load_config(path.as_ref())?;
    init_tracing_if_needed(&config.observability);
    Ok(tool_catalog(&config.tools)?)
}

fn build_planner(config: &OpspilotConfig, client: Arc<dyn LlmClient>, model: &str) -> Arc<dyn Planner> {
    let planner_config = LlmPlannerConfig {
        model: config
            .planner
            .model
            .clone()
            .unwrap_or_else(|| model.to_string()),
        temperature: config.planner.temperature,
        max_steps: config.planner.max_steps,
        max_parse_retries: config.planner.max_parse_retries,
        timeout_ms: config.planner.timeout_ms,
        ..LlmPlannerConfig::default()
    };
    Arc::new(LlmPlanner::new(client, planner_config))
}

fn build_judge(
    config: &OpspilotConfig,
    client: Arc<dyn LlmClient>,
    model: &str,
) -> Result<Arc<dyn CompletenessJudge>, BootstrapError> {
    match config.verifier.mode.trim() {
        "heuristic" => Ok(Arc::new(HeuristicJudge)),
        "llm" => {
            let judge_config = LlmJudgeConfig {
                model: config
                    .verifier
                    .model
                    .clone()
                    .unwrap_or_else(|| model.to_string()),
                temperature: config.verifier.temperature,
                timeout_ms: config.verifier.timeout_ms,
                ..LlmJudgeConfig::default()
            };
            Ok(Arc::new(LlmJudge::new(client, judge_config)))
        }
        other => Err(BootstrapError::UnsupportedVerifierMode(other.to_string())),
    }
}

/// Install the global subscriber once. `RUST_LOG` wins over the config level.
pub fn init_tracing_if_needed(observability: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let log_file_path = std::env::var("OPSPILOT_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| observability.log_file.clone());
        let file_writer = log_file_path.as_deref().and_then(create_log_writer);
        let fallback_level = match observability.log_level.trim().to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => "info",
        };

        let make_filter = || {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        };

        match file_writer {
            Some(writer) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(make_filter())
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer)
                    .try_init();
            }
            // stdout carries the response; logs go to stderr.
            None => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(make_filter())
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .try_init();
            }
        }

        tracing::info!(
            log_level = %observability.log_level,
            log_file = log_file_path.as_deref().unwrap_or("(stderr)"),
            "tracing initialized"
        );
    });
}

fn create_log_writer(path: &str) -> Option<SharedFileMakeWriter> {
    use std::fs::{create_dir_all, OpenOptions};

    let file_path = Path::new(path);
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = create_dir_all(parent) {
                eprintln!(
                    "failed to create log directory '{}': {}",
                    parent.display(),
                    err
                );
                return None;
            }
        }
    }
    let file = match OpenOptions::new().create(true).append(true).open(file_path) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("failed to open log file '{}': {}", file_path.display(), err);
            return None;
        }
    };
    Some(SharedFileMakeWriter::new(file))
}

#[derive(Clone)]
struct SharedFileMakeWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl SharedFileMakeWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

struct SharedFileWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileMakeWriter {
    type Writer = SharedFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileWriter {
            file: self.file.clone(),
        }
    }
}

impl std::io::Write for SharedFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file mutex poisoned"))?;
        std::io::Write::write(&mut *file, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file mutex poisoned"))?;
        std::io::Write::flush(&mut *file)
    }
}
