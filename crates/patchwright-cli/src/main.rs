//! Terminal front end for the patchwright pipeline.
//!
//! Thin entry points only — goal execution, history listing, and context
//! chain inspection all live in the `patchwright` library. Reads the API
//! key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Run a goal with interactive review
//! patchwright run "add input validation to parse.py"
//!
//! # Accept every proposed change without prompting
//! patchwright run --yes "regenerate the config loader"
//!
//! # Show the goals and context chain from this run
//! patchwright run --show-chain "split app.py into modules"
//! ```

use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use patchwright::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Terminal coding assistant: reviewed, applied changes from natural-language goals.
#[derive(Parser)]
#[command(name = "patchwright")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a goal against the workspace.
    Run {
        /// The goal, in natural language.
        goal: String,

        /// Model to use for completions.
        #[arg(long, default_value = patchwright::DEFAULT_MODEL)]
        model: String,

        /// Working directory for file operations.
        #[arg(long, default_value = ".")]
        workdir: String,

        /// Token budget for assembled context.
        #[arg(long, default_value_t = patchwright::DEFAULT_MAX_CONTEXT_TOKENS)]
        max_context_tokens: usize,

        /// Deadline per model call, in seconds.
        #[arg(long, default_value_t = 120)]
        call_timeout_secs: u64,

        /// Retries for transient call failures.
        #[arg(long, default_value_t = 2)]
        max_retries: u32,

        /// Accept every proposed change without prompting.
        #[arg(long)]
        yes: bool,

        /// Skip .bak backups of overwritten files.
        #[arg(long)]
        no_backup: bool,

        /// Print the goal list and context chain after the run.
        #[arg(long)]
        show_chain: bool,
    },
    /// List goals recorded in this session.
    Goals {
        /// Maximum goals to show.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Inspect the context chain carried across sub-goals.
    Chain,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            goal,
            model,
            workdir,
            max_context_tokens,
            call_timeout_secs,
            max_retries,
            yes,
            no_backup,
            show_chain,
        } => {
            run(
                goal,
                model,
                workdir,
                max_context_tokens,
                call_timeout_secs,
                max_retries,
                yes,
                no_backup,
                show_chain,
            )
            .await;
        }
        // Goal history and the context chain live in the runner and last
        // for one `run` invocation; there is no persistence layer. These
        // commands exist for scripting around `run --show-chain`.
        Commands::Goals { .. } => {
            println!("no goals recorded in this session (run a goal first, or use `run --show-chain`)");
        }
        Commands::Chain => {
            println!("context chain is empty (run a goal first, or use `run --show-chain`)");
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    goal: String,
    model: String,
    workdir: String,
    max_context_tokens: usize,
    call_timeout_secs: u64,
    max_retries: u32,
    yes: bool,
    no_backup: bool,
    show_chain: bool,
) {
    let api_key = match std::env::var("OPENROUTER_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: OPENROUTER_KEY environment variable is not set");
            process::exit(1);
        }
    };

    let client = match HttpModelClient::new(api_key) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to create API client: {e}");
            process::exit(1);
        }
    };

    let workdir = std::fs::canonicalize(&workdir).unwrap_or_else(|_| workdir.clone().into());
    let workspace = Workspace::new(workdir);
    let ui = TerminalUi::new().with_assume_yes(yes);
    let extractor = BlockExtractor::new();
    let classifier = KeywordClassifier::default();

    let config = RunnerConfig {
        model,
        max_context_tokens,
        call_timeout: Duration::from_secs(call_timeout_secs),
        retry: RetryConfig::with_retries(max_retries),
        backup: !no_backup,
        ..RunnerConfig::default()
    };

    let mut runner = GoalRunner::new(&client, &ui, &workspace, &extractor, &classifier, config);
    let mut session = Session::new(max_context_tokens);

    match runner.run_goal(&mut session, &goal).await {
        Ok(archived) => print_goal(archived),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }

    if show_chain {
        print_history(&runner);
    }
}

fn print_goal(goal: &Goal) {
    println!("\n{} — {}", goal.id, goal.status);
    println!(
        "  sub-goals: {} completed, {} failed, {} blocked",
        goal.count_with_status(GoalStatus::Completed),
        goal.count_with_status(GoalStatus::Failed),
        goal.count_with_status(GoalStatus::Blocked),
    );
    if goal.decomposition == DecompositionMode::Fallback {
        println!("  (breakdown degraded to a single catch-all sub-goal)");
    }
    if !goal.files_changed.is_empty() {
        println!("  files changed: {}", goal.files_changed.join(", "));
    }
    for change in &goal.changes_made {
        println!("  - {change}");
    }
}

fn print_history(runner: &GoalRunner<'_>) {
    println!("\nRecent goals:");
    for goal in runner.recent_goals(5) {
        println!("  {} [{}] {}", goal.id, goal.status, goal.description);
    }
    let chain = runner.chain();
    if chain.is_empty() {
        println!("\nContext chain: empty");
    } else {
        println!("\nContext chain ({} entries):", chain.len());
        for line in chain.render().lines() {
            println!("  {line}");
        }
    }
}
