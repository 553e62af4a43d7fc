//! Task domain model
//!
//! A task is a free-form description plus a completion timestamp. The `id` is
//! minted by the storage layer and is only unique within the partition the
//! task currently lives in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single TODO item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Per-partition sequence value assigned at insertion
    pub id: u64,

    /// What needs doing
    pub description: String,

    /// Unix seconds when the task was completed, `0` while incomplete
    #[serde(default)]
    pub completion_time: i64,
}

impl Task {
    /// Creates a new incomplete task
    pub fn new(id: u64, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            completion_time: 0,
        }
    }

    /// Returns true once the task has been marked complete
    pub fn is_complete(&self) -> bool {
        self.completion_time != 0
    }

    /// Completion time as a UTC datetime, if complete
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        if !self.is_complete() {
            return None;
        }
        DateTime::from_timestamp(self.completion_time, 0)
    }
}
