//! SwarmForge CLI - goal-driven workflow orchestration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use swarmforge_agents::{AgentRegistry, FnAgent};
use swarmforge_core::{
    CompletionStrategy, IterationConfig, SessionId, SessionSnapshot, SessionStatus, TaskCounts,
    TaskStatus, ValueMap,
};
use swarmforge_execution::Orchestrator;
use swarmforge_iteration::{IterationController, LineageConfig};
use swarmforge_storage::{JsonSessionStore, SessionStore};
use swarmforge_workflow::{
    register_builtins, WorkflowRegistry, ANALYSIS_AGENT, DEVELOPMENT_AGENT, DOCUMENTATION_AGENT,
    PLANNING_AGENT, RESEARCH_AGENT,
};

#[derive(Parser)]
#[command(name = "swarmforge")]
#[command(about = "Goal-driven workflow orchestration", long_about = None)]
struct Cli {
    /// Project directory holding the session store
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow against a goal
    Build {
        /// File containing the goal text
        #[arg(long)]
        goal_file: PathBuf,
        /// Workflow to run
        #[arg(long, default_value = "standard_project")]
        workflow: String,
        /// Return immediately; poll with `status`
        #[arg(long)]
        background: bool,
        /// Iteration bound (enables iterative execution)
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Completion strategy (enables iterative execution)
        #[arg(long)]
        completion_strategy: Option<StrategyArg>,
        /// Version to drive toward (version-driven strategy)
        #[arg(long)]
        target_version: Option<String>,
        /// Allow the analysis step to raise the iteration bound
        #[arg(long)]
        adaptive: bool,
        /// Keep iterating after a failed pass
        #[arg(long)]
        continue_past_failure: bool,
    },
    /// Show the status of a session
    Status {
        /// Session ID
        #[arg(long)]
        session_id: String,
        /// Poll until the session is terminal
        #[arg(long)]
        watch: bool,
    },
    /// Cancel a session
    Cancel {
        /// Session ID
        #[arg(long)]
        session_id: String,
    },
    /// List available workflows
    Workflows,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Fixed,
    Smart,
    VersionDriven,
}

impl From<StrategyArg> for CompletionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Fixed => Self::Fixed,
            StrategyArg::Smart => Self::Smart,
            StrategyArg::VersionDriven => Self::VersionDriven,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let store = Arc::new(JsonSessionStore::new(&cli.project_dir).await?);

    match cli.command {
        Commands::Build {
            goal_file,
            workflow,
            background,
            max_iterations,
            completion_strategy,
            target_version,
            adaptive,
            continue_past_failure,
        } => {
            let goal = std::fs::read_to_string(&goal_file)
                .with_context(|| format!("reading goal file {}", goal_file.display()))?
                .trim()
                .to_string();
            anyhow::ensure!(!goal.is_empty(), "goal file {} is empty", goal_file.display());

            let orchestrator = build_orchestrator(store)?;
            let mut context = ValueMap::new();
            context.insert(
                "project_dir".into(),
                serde_json::json!(cli.project_dir.display().to_string()),
            );

            let iterative = workflow == "indefinite"
                || workflow == "iteration"
                || completion_strategy.is_some()
                || max_iterations.is_some()
                || adaptive
                || target_version.is_some();

            if iterative {
                // `indefinite` has no built-in bound; its only exit is the
                // analysis verdict.
                let (strategy, bound) = if workflow == "indefinite" {
                    (CompletionStrategy::Smart, None)
                } else {
                    (
                        completion_strategy.map(Into::into).unwrap_or_else(|| {
                            if target_version.is_some() {
                                CompletionStrategy::VersionDriven
                            } else {
                                CompletionStrategy::Fixed
                            }
                        }),
                        max_iterations.or(IterationConfig::default().max_iterations),
                    )
                };

                let mut config = LineageConfig::new(&workflow, &goal, ANALYSIS_AGENT)
                    .context(context)
                    .iteration(IterationConfig {
                        completion_strategy: strategy,
                        max_iterations: bound,
                        target_version,
                        adaptive,
                    });
                if continue_past_failure {
                    config = config.continue_past_failure();
                }

                info!(workflow_id = %workflow, strategy = %strategy, "starting iterative build");
                let controller = IterationController::new(orchestrator);
                let report = controller.run(config).await?;

                println!("Lineage {} stopped: {}", report.lineage_id, report.stop_reason);
                for pass in &report.passes {
                    println!(
                        "  pass {} | {} | {} - {}",
                        pass.iteration,
                        pass.session_id,
                        format_session_status(pass.status),
                        pass.goal,
                    );
                }
                if let Some(summary) = report
                    .last_pass()
                    .and_then(|p| p.verdict.as_ref())
                    .and_then(|v| v.summary.as_ref())
                {
                    println!("Summary: {summary}");
                }
            } else {
                info!(workflow_id = %workflow, background, "starting build");
                let session_id = orchestrator
                    .start_session(&workflow, &goal, context, None)
                    .await?;

                if background {
                    orchestrator.run(session_id, false).await?;
                    println!("Session {session_id} started in the background");
                    println!("Poll with: swarmforge status --session-id {session_id}");
                    // Keep the process alive until the detached run settles;
                    // a separate process can poll the store meanwhile.
                    loop {
                        let snapshot = orchestrator.status(session_id).await?;
                        if snapshot.overall_status.is_terminal() {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                } else {
                    let snapshot = orchestrator.run(session_id, true).await?;
                    if let Some(snapshot) = snapshot {
                        print_snapshot(&snapshot);
                    }
                }
            }
        }
        Commands::Status { session_id, watch } => {
            let session_id: SessionId = session_id
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid session ID"))?;

            loop {
                let Some(snapshot) = store.load(session_id).await? else {
                    anyhow::bail!("unknown session: {session_id}");
                };
                print_snapshot(&snapshot);
                if !watch || snapshot.overall_status.is_terminal() {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
        Commands::Cancel { session_id } => {
            let session_id: SessionId = session_id
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid session ID"))?;
            let Some(mut snapshot) = store.load(session_id).await? else {
                anyhow::bail!("unknown session: {session_id}");
            };
            anyhow::ensure!(
                !snapshot.overall_status.is_terminal(),
                "session {session_id} is already terminal ({})",
                snapshot.overall_status
            );

            // Cross-process cancel: rewrite the durable snapshot. The
            // scheduler never overwrites a stored Cancelled status with a
            // non-terminal one, and flips its own cancelled flag the next
            // time it persists, so dispatch stops.
            let now = chrono::Utc::now();
            for task in &mut snapshot.tasks {
                if matches!(task.status, TaskStatus::Pending | TaskStatus::Ready) {
                    task.status = TaskStatus::Skipped;
                    task.finished_at = Some(now);
                }
            }
            snapshot.overall_status = SessionStatus::Cancelled;
            snapshot.updated_at = now;
            snapshot.counts = TaskCounts::default();
            snapshot.counts.total = snapshot.tasks.len();
            for task in &snapshot.tasks {
                match task.status {
                    TaskStatus::Completed => snapshot.counts.completed += 1,
                    TaskStatus::Failed => snapshot.counts.failed += 1,
                    TaskStatus::Skipped => snapshot.counts.skipped += 1,
                    _ => snapshot.counts.in_progress += 1,
                }
            }
            store.save(&snapshot).await?;
            println!("Session {session_id} cancelled");
        }
        Commands::Workflows => {
            let mut workflows = WorkflowRegistry::new();
            register_builtins(&mut workflows)?;
            println!("Available workflows");
            for summary in workflows.list() {
                println!(
                    "  {} | {} phase(s) - {}",
                    summary.id, summary.phases, summary.description
                );
            }
        }
    }

    Ok(())
}

/// Wire the built-in workflows and placeholder agents over a session store.
///
/// The placeholder agents produce canned outputs; real capability providers
/// plug in through the same registry.
fn build_orchestrator(store: Arc<JsonSessionStore>) -> Result<Orchestrator> {
    let mut agents = AgentRegistry::new();
    register_placeholder_agents(&mut agents)?;

    let mut workflows = WorkflowRegistry::new();
    register_builtins(&mut workflows)?;

    Ok(Orchestrator::new(agents, workflows, store))
}

fn register_placeholder_agents(agents: &mut AgentRegistry) -> Result<()> {
    agents.register(
        RESEARCH_AGENT,
        Arc::new(FnAgent::new(|inputs: &ValueMap| {
            Ok(placeholder_output(
                "findings",
                &format!("research notes for: {}", goal_of(inputs)),
            ))
        })),
    )?;
    agents.register(
        PLANNING_AGENT,
        Arc::new(FnAgent::new(|inputs: &ValueMap| {
            Ok(placeholder_output(
                "plan",
                &format!("implementation plan for: {}", goal_of(inputs)),
            ))
        })),
    )?;
    agents.register(
        DEVELOPMENT_AGENT,
        Arc::new(FnAgent::new(|inputs: &ValueMap| {
            Ok(placeholder_output(
                "artifact",
                &format!("implementation of: {}", goal_of(inputs)),
            ))
        })),
    )?;
    agents.register(
        DOCUMENTATION_AGENT,
        Arc::new(FnAgent::new(|inputs: &ValueMap| {
            Ok(placeholder_output(
                "documentation",
                &format!("documentation for: {}", goal_of(inputs)),
            ))
        })),
    )?;
    // The placeholder analysis never asks for another pass, so iterative
    // builds terminate after one iteration until a real provider is wired.
    agents.register(
        ANALYSIS_AGENT,
        Arc::new(FnAgent::new(|_: &ValueMap| {
            let mut out = ValueMap::new();
            out.insert("should_continue".into(), serde_json::json!(false));
            out.insert(
                "summary".into(),
                serde_json::json!("placeholder analysis; no further iteration warranted"),
            );
            Ok(out)
        })),
    )?;
    Ok(())
}

fn placeholder_output(key: &str, text: &str) -> ValueMap {
    let mut out = ValueMap::new();
    out.insert(key.to_string(), serde_json::json!(text));
    out
}

fn goal_of(inputs: &ValueMap) -> &str {
    inputs.get("goal").and_then(|v| v.as_str()).unwrap_or("")
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!(
        "Session {} | {} | {}",
        snapshot.session_id,
        snapshot.workflow_id,
        format_session_status(snapshot.overall_status),
    );
    println!("  Goal: {}", snapshot.goal);
    println!(
        "  Tasks: {} total, {} completed, {} failed, {} skipped, {} in progress",
        snapshot.counts.total,
        snapshot.counts.completed,
        snapshot.counts.failed,
        snapshot.counts.skipped,
        snapshot.counts.in_progress,
    );
    for task in &snapshot.tasks {
        match &task.error {
            Some(error) => println!(
                "    {} | {} | {} ({})",
                task.phase,
                format_task_status(task.status),
                error.reason_code(),
                error,
            ),
            None => println!("    {} | {}", task.phase, format_task_status(task.status)),
        }
    }
    if let Some(failure) = snapshot.first_failure() {
        println!(
            "  First failure: {} ({})",
            failure.phase,
            failure
                .error
                .as_ref()
                .map(|e| e.reason_code())
                .unwrap_or("unknown"),
        );
    }
}

fn format_session_status(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Initializing => "INITIALIZING",
        SessionStatus::Running => "RUNNING",
        SessionStatus::Completed => "COMPLETED",
        SessionStatus::Failed => "FAILED",
        SessionStatus::Cancelled => "CANCELLED",
    }
}

fn format_task_status(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "PENDING",
        TaskStatus::Ready => "READY",
        TaskStatus::Running => "RUNNING",
        TaskStatus::Completed => "COMPLETED",
        TaskStatus::Failed => "FAILED",
        TaskStatus::Skipped => "SKIPPED",
    }
}
