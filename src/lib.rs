pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    create_cycle_impl, get_timer_state_impl, interrupt_cycle_impl, list_history_impl,
    watch_cycle_impl, AppState,
};
use application::countdown::{format_remaining, CountdownEnd, TickOutcome};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Pomodoro countdown timer with a local history of cycles
#[derive(Parser, Debug)]
#[command(name = "pomodoro-timer")]
#[command(about = "Pomodoro countdown timer with local cycle history", long_about = None)]
struct Cli {
    /// Workspace holding config/, state/ and logs/ (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the workspace layout and print where state is kept
    Init,
    /// Show the running cycle and its remaining time
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Start a new cycle and count it down
    Start(StartArgs),
    /// Interrupt the running cycle
    Stop,
    /// Resume the countdown of the running cycle
    Watch,
    /// List every cycle with its outcome
    History {
        #[arg(long)]
        json: bool,
    },
    /// Print the configured task suggestions
    Suggestions,
}

#[derive(Parser, Debug)]
struct StartArgs {
    /// What you are working on
    #[arg(long)]
    task: String,

    /// Cycle length in minutes
    #[arg(long, default_value = "25")]
    minutes: String,

    /// Create the cycle and return without counting down
    #[arg(long)]
    detach: bool,
}

fn init(state: &AppState, workspace_root: &Path) -> Result<(), String> {
    state.log_info("init", "workspace ready");
    println!("workspace: {}", workspace_root.display());
    println!("database:  {}", state.database_path().display());
    Ok(())
}

fn status(state: &AppState, json: bool) -> Result<(), String> {
    let timer =
        get_timer_state_impl(state).map_err(|error| state.command_error("get_timer_state", &error))?;
    if json {
        return print_json(&timer);
    }

    if let Some(cycle_id) = &timer.finished_cycle_id {
        println!("Cycle {cycle_id} completed.");
    }
    match timer.active_cycle {
        Some(active) => println!(
            "{}  {} ({} minutes)",
            active.remaining, active.task, active.planned_minutes
        ),
        None => println!("No cycle running."),
    }
    Ok(())
}

async fn start(state: &AppState, args: StartArgs) -> Result<(), String> {
    let cycle = create_cycle_impl(state, args.task, args.minutes)
        .map_err(|error| state.command_error("create_cycle", &error))?;
    println!(
        "Started \"{}\" for {} minutes.",
        cycle.task, cycle.planned_minutes
    );
    if args.detach {
        return Ok(());
    }
    watch(state).await
}

fn stop(state: &AppState) -> Result<(), String> {
    let interrupted =
        interrupt_cycle_impl(state).map_err(|error| state.command_error("interrupt_cycle", &error))?;
    match interrupted {
        Some(cycle) => println!("Interrupted \"{}\".", cycle.task),
        None => println!("No cycle running."),
    }
    Ok(())
}

async fn watch(state: &AppState) -> Result<(), String> {
    let timer =
        get_timer_state_impl(state).map_err(|error| state.command_error("get_timer_state", &error))?;
    if let Some(cycle_id) = &timer.finished_cycle_id {
        println!("Cycle {cycle_id} completed.");
    }
    let Some(active) = timer.active_cycle else {
        println!("No cycle running.");
        return Ok(());
    };

    let task = active.task;
    let end = watch_cycle_impl(state, &active.id, ctrl_c(), |outcome| render_tick(&task, outcome))
        .await
        .map_err(|error| state.command_error("watch_cycle", &error))?;
    println!();

    match end {
        CountdownEnd::Finished(cycle) => println!("Completed \"{}\".", cycle.task),
        CountdownEnd::Interrupted(Some(cycle)) => println!("Interrupted \"{}\".", cycle.task),
        CountdownEnd::Interrupted(None) | CountdownEnd::Stopped => {
            println!("Cycle is no longer running.")
        }
    }
    Ok(())
}

fn history(state: &AppState, json: bool) -> Result<(), String> {
    let items =
        list_history_impl(state).map_err(|error| state.command_error("list_history", &error))?;
    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No cycles yet.");
        return Ok(());
    }

    println!(
        "{:<28} {:<12} {:<32} {}",
        "Task", "Duration", "Started at", "Status"
    );
    for item in items {
        println!(
            "{:<28} {:<12} {:<32} {}",
            item.task,
            item.duration,
            format!("{} ({})", item.started_relative, item.started_at),
            item.status_label
        );
    }
    Ok(())
}

fn suggestions(state: &AppState) -> Result<(), String> {
    for suggestion in &state.config().task_suggestions {
        println!("{suggestion}");
    }
    Ok(())
}

fn render_tick(task: &str, outcome: &TickOutcome) {
    if let TickOutcome::Running {
        remaining_seconds, ..
    } = outcome
    {
        print!("\r{}  {task}", format_remaining(*remaining_seconds));
        let _ = std::io::stdout().flush();
    }
}

async fn ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let formatted = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{formatted}");
    Ok(())
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let workspace_root = match cli.root {
        Some(path) => path,
        None => match std::env::current_dir() {
            Ok(path) => path,
            Err(error) => {
                eprintln!("error: failed to resolve current directory: {error}");
                return ExitCode::FAILURE;
            }
        },
    };

    let state = match AppState::new(workspace_root.clone()) {
        Ok(state) => state,
        Err(error) => {
            eprintln!("error: failed to initialize app state: {error}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command.unwrap_or(Commands::Status { json: false }) {
        Commands::Init => init(&state, &workspace_root),
        Commands::Status { json } => status(&state, json),
        Commands::Start(args) => start(&state, args).await,
        Commands::Stop => stop(&state),
        Commands::Watch => watch(&state).await,
        Commands::History { json } => history(&state, json),
        Commands::Suggestions => suggestions(&state),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
