use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use opspilot_core::executor::ExecutionProgressReporter;
use opspilot_runtime::{load_tool_catalog, RunError, RuntimeApp};

use crate::render::{render_catalog, render_failure, render_plan, render_response, StderrProgress};

const DEFAULT_CONFIG: &str = "config/opspilot.yaml";

#[derive(Debug, Parser)]
#[command(name = "opspilot", about = "Plan, run and verify tool-backed tasks with an LLM")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan, execute and verify a task
    Run(RunArgs),
    /// Print the plan for a task without running it
    Plan(PlanArgs),
    /// List registered tools
    Tools(ToolsArgs),
}

#[derive(Debug, Args, Clone)]
struct RunArgs {
    #[arg(long, env = "OPSPILOT_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    /// Print the structured response as JSON
    #[arg(long)]
    json: bool,
    /// Stream step progress and info logs to stderr
    #[arg(long)]
    verbose: bool,
    #[arg(value_name = "TASK", required = true)]
    task: Vec<String>,
}

#[derive(Debug, Args, Clone)]
struct PlanArgs {
    #[arg(long, env = "OPSPILOT_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    #[arg(value_name = "TASK", required = true)]
    task: Vec<String>,
}

#[derive(Debug, Args, Clone)]
struct ToolsArgs {
    #[arg(long, env = "OPSPILOT_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    #[arg(long)]
    json: bool,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run(args) => run_task(args).await,
            Command::Plan(args) => {
                ensure_log_filter(false);
                let app = RuntimeApp::from_config_path(args.config)?;
                let task = args.task.join(" ");
                match app.controller.plan_only(&task).await {
                    Ok(plan) => {
                        println!("{}", render_plan(&plan));
                        Ok(())
                    }
                    Err(err) => fail(&err, false),
                }
            }
            Command::Tools(args) => {
                ensure_log_filter(false);
                let catalog = load_tool_catalog(&args.config)?;
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&catalog)?);
                } else {
                    println!("{}", render_catalog(&catalog));
                }
                Ok(())
            }
        }
    }
}

async fn run_task(args: RunArgs) -> anyhow::Result<()> {
    ensure_log_filter(args.verbose);
    let reporter: Option<Arc<dyn ExecutionProgressReporter>> = if args.verbose {
        Some(Arc::new(StderrProgress))
    } else {
        None
    };
    let app = RuntimeApp::from_config_path_with_reporter(args.config, reporter)?;
    let task = args.task.join(" ");

    match app.controller.run(&task).await {
        Ok(response) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", render_response(&response));
            }
            Ok(())
        }
        Err(err) => fail(&err, args.json),
    }
}

fn fail(err: &RunError, json: bool) -> anyhow::Result<()> {
    let report = err.report();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        eprintln!("{}", render_failure(&report));
    }
    std::process::exit(1);
}

/// `--verbose` raises the filter to info unless `RUST_LOG` is set; otherwise
/// `observability.log_level` applies.
fn ensure_log_filter(verbose: bool) {
    if !verbose || env::var("RUST_LOG").is_ok() {
        return;
    }
    env::set_var("RUST_LOG", "info");
}
