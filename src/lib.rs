//! task-cli - a personal TODO tracker
//!
//! Tasks are kept in a local SQLite file with two buckets, one for incomplete
//! tasks and one for completed tasks. The command line addresses incomplete
//! tasks by their 1-indexed position in `task list`.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{Clock, FixedClock, SystemClock, Task};
pub use storage::{StoreError, TaskStore};
