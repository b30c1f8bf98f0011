// crates/stagecli/src/main.rs

mod plan;

use anyhow::Result;
use clap::{Parser, Subcommand};
use plan::{Plan, PlanContext};
use serde_json::Value;
use stagecore::ExecutionEvent;
use stageruntime::StageRuntime;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stage")]
#[command(about = "Run dependent tasks in parallel groups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a plan file
    Run {
        /// Path to plan JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Extra inputs as a JSON object, merged over the plan inputs
        #[arg(short, long)]
        input: Option<String>,

        /// Maximum number of tasks running at once within a group
        #[arg(short, long)]
        max_parallel: Option<usize>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the execution groups of a plan
    Groups {
        /// Path to plan JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check a plan for unknown tasks and cycles
    Validate {
        /// Path to plan JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Create a new example plan
    Init {
        /// Output file path
        #[arg(short, long, default_value = "plan.json")]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            max_parallel,
            verbose,
        } => {
            init_tracing(verbose);
            run_plan(file, input, max_parallel).await?;
        }

        Commands::Groups { file } => {
            init_tracing(false);
            print_groups(file)?;
        }

        Commands::Validate { file } => {
            init_tracing(false);
            validate_plan(file)?;
        }

        Commands::Init { output } => {
            create_example_plan(output)?;
        }
    }

    Ok(())
}

async fn run_plan(file: PathBuf, input: Option<String>, max_parallel: Option<usize>) -> Result<()> {
    println!("🚀 Loading plan from: {}", file.display());

    let plan = Plan::load(&file)?;
    let tasks = plan.build()?;

    println!("📋 Plan: {}", plan.name);
    println!("   Tasks: {}", tasks.len());
    println!();

    let mut inputs = plan.inputs.clone();
    if let Some(input_str) = input {
        match serde_json::from_str::<Value>(&input_str)? {
            Value::Object(obj) => inputs.extend(obj),
            _ => return Err(anyhow::anyhow!("Input must be a JSON object")),
        }
    }

    let mut config = plan.settings.clone().unwrap_or_default();
    if max_parallel.is_some() {
        config.max_parallel_tasks = max_parallel;
    }

    tracing::debug!("Runtime config: {:?}", config);
    let runtime = StageRuntime::with_config(config);
    let events = runtime.subscribe_events();

    // Ends once the runtime, and with it the event bus, is dropped
    let event_task = tokio::spawn(print_events(events));

    let outcome = runtime.execute(&tasks, Arc::new(PlanContext { inputs })).await;

    drop(runtime);
    let _ = event_task.await;

    let execution = outcome?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", execution.execution_id);
    println!("   Groups: {}", execution.groups);
    println!();
    println!("📤 Results:");
    for id in tasks.task_ids() {
        if let Some(result) = execution.results.get(id) {
            println!("   {}: {}", tasks.name(id), result);
        }
    }

    Ok(())
}

/// Print events as they arrive; returns how many were printed once the bus closes
async fn print_events(mut events: Receiver<ExecutionEvent>) -> usize {
    let mut printed = 0;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event listener lagged, skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        printed += 1;
        match event {
            ExecutionEvent::RunStarted { tasks, groups, .. } => {
                println!("▶️  Running {} tasks in {} groups", tasks, groups);
            }
            ExecutionEvent::GroupStarted { group, tasks, .. } => {
                println!("  📦 Group {}: {}", group, tasks.join(", "));
            }
            ExecutionEvent::TaskStarted { task, .. } => {
                println!("    ⚡ Starting task: {}", task);
            }
            ExecutionEvent::TaskCompleted { task, duration_ms, .. } => {
                println!("    ✅ Task {} completed in {}ms", task, duration_ms);
            }
            ExecutionEvent::TaskFailed { task, error, .. } => {
                println!("    ❌ Task {} failed: {}", task, error);
            }
            ExecutionEvent::RunCompleted { success, duration_ms, .. } => {
                if success {
                    println!("✨ Plan completed successfully in {}ms", duration_ms);
                } else {
                    println!("💥 Plan failed after {}ms", duration_ms);
                }
            }
        }
    }
    printed
}

fn print_groups(file: PathBuf) -> Result<()> {
    let plan = Plan::load(&file)?;
    let tasks = plan.build()?;
    let grouping = tasks.build_schedule()?;

    println!("📋 Plan: {}", plan.name);
    for (index, group) in grouping.iter().enumerate() {
        let names: Vec<&str> = group.iter().map(|id| tasks.name(*id)).collect();
        println!("  Group {}: {}", index, names.join(", "));
    }

    Ok(())
}

fn validate_plan(file: PathBuf) -> Result<()> {
    println!("🔍 Validating plan: {}", file.display());

    let plan = Plan::load(&file)?;
    let tasks = plan.build()?;
    let grouping = tasks.build_schedule()?;

    println!("✅ Plan is valid:");
    println!("   Name: {}", plan.name);
    println!("   Tasks: {}", tasks.len());
    println!("   Groups: {}", grouping.len());

    Ok(())
}

fn create_example_plan(output: PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(&Plan::example())?;
    std::fs::write(&output, json)?;

    println!("✨ Created example plan: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  stage run --file {} --input '{{\"base\": 40}}'", output.display());

    Ok(())
}
