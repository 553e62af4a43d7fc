//! # Storage Layer
//!
//! Persistence for the task tracker.
//!
//! ## Layout
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Tasks | SQLite, two buckets of JSON records | `~/.tasks/tasks.db` |
//! | Lock | `fs2` exclusive lock | `~/.tasks/tasks.db.lock` |
//! | Config | TOML | `~/.config/task-cli/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`KvStore`] holds an exclusive file lock from open until close
//! - Every mutation is a single SQLite transaction
//!
//! ## Key Types
//!
//! - [`TaskStore`] - Task lifecycle operations
//! - [`KvStore`] - Ordered key-value buckets with per-bucket sequences
//! - [`Config`] - User configuration

mod config;
pub mod kv;
mod task_store;

pub use config::{Config, ConfigError, CONFIG_ENV};
pub use kv::{KvError, KvStore};
pub use task_store::{ErrorKind, StoreError, TaskStore, COMPLETED_BUCKET, INCOMPLETE_BUCKET};
