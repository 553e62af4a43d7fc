//! # Command-Line Interface
//!
//! User-facing commands and output formatting.
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `add` | Append tasks to the TODO list |
//! | `list` | Show incomplete tasks with their numbers |
//! | `do` | Complete tasks by number |
//! | `rm` | Delete tasks by number |
//! | `completed` | Show tasks finished in the last day |
//!
//! All commands accept `--format json` and `--verbose`. The database path
//! comes from `--db` / `$TASK_DB`, then the config file, then
//! `~/.tasks/tasks.db`.
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod task;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
