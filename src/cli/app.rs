//! Main CLI application structure

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::task;
use crate::storage::{Config, TaskStore};

#[derive(Parser)]
#[command(name = "task")]
#[command(author, version, about = "task is a CLI for managing your TODOs.")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Task database to use instead of ~/.tasks/tasks.db
    #[arg(long, global = true, env = "TASK_DB", value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add tasks to your TODO list
    ///
    /// Enclose each task in quotes, such as
    ///
    ///   task add "do dishes" "wash clothes"
    Add {
        /// One or more task descriptions
        #[arg(required = true)]
        descriptions: Vec<String>,
    },

    /// Mark tasks on your TODO list as complete
    ///
    /// Pass the task numbers as displayed by `task list`. For example
    /// `task do 1 6 15` completes the 1st, 6th and 15th tasks.
    Do {
        /// Task numbers from `task list`
        #[arg(required = true)]
        positions: Vec<usize>,
    },

    /// List all of your incomplete tasks
    List,

    /// List tasks completed recently
    Completed {
        /// Look back this many hours (default from config, 24)
        #[arg(long)]
        hours: Option<u32>,
    },

    /// Delete incomplete tasks from your TODO list
    ///
    /// Pass the task numbers as displayed by `task list`. For example
    /// `task rm 4 9` deletes the 4th and 9th tasks.
    Rm {
        /// Task numbers from `task list`
        #[arg(required = true)]
        positions: Vec<usize>,
    },
}

/// Installs the stderr log subscriber
///
/// `--verbose` turns on debug output for this crate; otherwise `RUST_LOG`
/// decides, falling back to warnings only.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("task_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

/// Creates the directory that will hold the database
fn ensure_parent_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create data directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = Output::new(cli.format);

    let config = Config::load()?;
    debug!(?config, "loaded configuration");

    let db_path = match cli.db {
        Some(path) => path,
        None => config.db_path()?,
    };
    ensure_parent_dir(&db_path)?;

    debug!(path = %db_path.display(), "opening task database");
    let mut store = TaskStore::open(&db_path)
        .with_context(|| format!("Failed to open task database: {}", db_path.display()))?;

    let result = execute(cli.command, &mut store, &config, &output);

    let closed = store.close();
    result?;
    closed.context("Failed to close task database")?;

    debug!("command completed successfully");
    Ok(())
}

fn execute(
    command: Commands,
    store: &mut TaskStore,
    config: &Config,
    output: &Output,
) -> Result<()> {
    match command {
        Commands::Add { descriptions } => task::add(store, output, &descriptions),
        Commands::Do { positions } => task::complete(store, output, &positions),
        Commands::List => task::list(store, output),
        Commands::Completed { hours } => {
            let hours = hours.unwrap_or(config.completed_window_hours);
            task::completed(store, output, hours)
        }
        Commands::Rm { positions } => task::remove(store, output, &positions),
    }
}
