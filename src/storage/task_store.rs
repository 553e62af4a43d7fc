//! Task persistence on the ordered key-value store
//!
//! Tasks live in one of two buckets: [`INCOMPLETE_BUCKET`] and
//! [`COMPLETED_BUCKET`]. Each bucket is keyed by the 8-byte big-endian value of
//! its own sequence, so iteration order is insertion order. Positions handed
//! in by callers are 1-indexed ranks in the incomplete bucket and are resolved
//! against a single snapshot taken inside the write transaction.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::kv::{self, Bucket, KvError, KvStore};
use crate::domain::{Clock, SystemClock, Task};

pub const INCOMPLETE_BUCKET: &str = "incompleteTasks";
pub const COMPLETED_BUCKET: &str = "completedTasks";

/// Broad classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Storage, lock, or codec failure
    Io,
    /// Caller supplied something the store refuses
    Validation,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task {position} does not exist (there are {count} incomplete tasks)")]
    InvalidPosition { position: usize, count: usize },

    #[error("Task {0} was given more than once")]
    DuplicatePosition(usize),

    #[error("Task description cannot be empty")]
    EmptyDescription,

    #[error("Clock returned a non-positive completion time: {0}")]
    InvalidClock(i64),

    #[error("Malformed key of {len} bytes in bucket {bucket}")]
    CorruptKey { bucket: String, len: usize },

    #[error("Failed to encode or decode task: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] KvError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidPosition { .. }
            | StoreError::DuplicatePosition(_)
            | StoreError::EmptyDescription => ErrorKind::Validation,
            StoreError::InvalidClock(_)
            | StoreError::CorruptKey { .. }
            | StoreError::Codec(_)
            | StoreError::Storage(_) => ErrorKind::Io,
        }
    }

    /// Returns true if the caller's input was rejected
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// On-disk value of a task; the id is the key
#[derive(Serialize, Deserialize)]
struct TaskRecord<'a> {
    description: Cow<'a, str>,
    #[serde(default)]
    completion_time: i64,
}

fn encode(task: &Task) -> Result<Vec<u8>> {
    let record = TaskRecord {
        description: Cow::Borrowed(task.description.as_str()),
        completion_time: task.completion_time,
    };
    Ok(serde_json::to_vec(&record)?)
}

fn decode(bucket: &str, key: &[u8], value: &[u8]) -> Result<Task> {
    let id = kv::key_u64(key).ok_or_else(|| StoreError::CorruptKey {
        bucket: bucket.to_string(),
        len: key.len(),
    })?;
    let record: TaskRecord<'_> = serde_json::from_slice(value)?;
    Ok(Task {
        id,
        description: record.description.into_owned(),
        completion_time: record.completion_time,
    })
}

/// Decodes every task in a bucket, in key order
fn read_tasks(bucket: &Bucket<'_>) -> Result<Vec<Task>> {
    bucket
        .entries()?
        .iter()
        .map(|(key, value)| decode(bucket.name(), key, value))
        .collect()
}

/// Maps 1-indexed positions onto the snapshot, in caller order
///
/// Every position is checked before anything is returned, so a bad position
/// anywhere in the batch rejects the whole batch.
fn resolve_positions(snapshot: &[Task], positions: &[usize]) -> Result<Vec<Task>> {
    let count = snapshot.len();
    let mut seen = HashSet::with_capacity(positions.len());

    positions
        .iter()
        .map(|&position| {
            if position == 0 || position > count {
                return Err(StoreError::InvalidPosition { position, count });
            }
            if !seen.insert(position) {
                return Err(StoreError::DuplicatePosition(position));
            }
            Ok(snapshot[position - 1].clone())
        })
        .collect()
}

/// Durable store of incomplete and completed tasks
pub struct TaskStore<C: Clock = SystemClock> {
    kv: KvStore,
    clock: C,
}

impl TaskStore<SystemClock> {
    /// Opens (or creates) the task database at `path` using wall-clock time
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_clock(path, SystemClock)
    }
}

impl<C: Clock> TaskStore<C> {
    /// Opens (or creates) the task database with an explicit time source
    pub fn open_with_clock(path: impl AsRef<Path>, clock: C) -> Result<Self> {
        let kv = KvStore::open(path)?;
        Ok(Self { kv, clock })
    }

    /// Appends a new incomplete task
    pub fn add_task(&mut self, description: &str) -> Result<Task> {
        if description.trim().is_empty() {
            return Err(StoreError::EmptyDescription);
        }

        let tx = self.kv.begin_write()?;
        let task = {
            let bucket = tx.create_bucket_if_not_exists(INCOMPLETE_BUCKET)?;
            let task = Task::new(bucket.next_sequence()?, description);
            bucket.put(&kv::u64_key(task.id), &encode(&task)?)?;
            task
        };
        tx.commit()?;

        Ok(task)
    }

    /// All incomplete tasks, oldest first
    pub fn list_incomplete(&self) -> Result<Vec<Task>> {
        let tx = self.kv.begin_read()?;
        let tasks = match tx.bucket(INCOMPLETE_BUCKET)? {
            Some(bucket) => read_tasks(&bucket)?,
            None => Vec::new(),
        };
        Ok(tasks)
    }

    /// Completed tasks with `completion_time >= since`, in completion order
    pub fn list_completed_since(&self, since: i64) -> Result<Vec<Task>> {
        let tx = self.kv.begin_read()?;
        let tasks = match tx.bucket(COMPLETED_BUCKET)? {
            Some(bucket) => read_tasks(&bucket)?,
            None => return Ok(Vec::new()),
        };

        Ok(tasks
            .into_iter()
            .filter(|t| t.completion_time >= since)
            .collect())
    }

    /// Moves the tasks at `positions` into the completed bucket
    ///
    /// All tasks in one call share a single completion timestamp and receive
    /// fresh ids from the completed bucket's sequence. Returned in the order
    /// the positions were given.
    pub fn complete_tasks(&mut self, positions: &[usize]) -> Result<Vec<Task>> {
        let now = self.clock.now();
        // Zero marks a task as incomplete
        if now <= 0 {
            return Err(StoreError::InvalidClock(now));
        }

        let tx = self.kv.begin_write()?;
        let completed = {
            let snapshot = match tx.bucket(INCOMPLETE_BUCKET)? {
                Some(bucket) => read_tasks(&bucket)?,
                None => Vec::new(),
            };
            let targets = resolve_positions(&snapshot, positions)?;
            if targets.is_empty() {
                return Ok(Vec::new());
            }

            let incomplete = tx.create_bucket_if_not_exists(INCOMPLETE_BUCKET)?;
            let done = tx.create_bucket_if_not_exists(COMPLETED_BUCKET)?;

            let mut completed = Vec::with_capacity(targets.len());
            for mut task in targets {
                incomplete.delete(&kv::u64_key(task.id))?;

                task.id = done.next_sequence()?;
                task.completion_time = now;
                done.put(&kv::u64_key(task.id), &encode(&task)?)?;

                completed.push(task);
            }
            completed
        };
        tx.commit()?;

        Ok(completed)
    }

    /// Deletes the tasks at `positions` from the incomplete bucket
    pub fn remove_tasks(&mut self, positions: &[usize]) -> Result<Vec<Task>> {
        let tx = self.kv.begin_write()?;
        let removed = {
            let Some(incomplete) = tx.bucket(INCOMPLETE_BUCKET)? else {
                return resolve_positions(&[], positions);
            };
            let snapshot = read_tasks(&incomplete)?;
            let targets = resolve_positions(&snapshot, positions)?;

            for task in &targets {
                incomplete.delete(&kv::u64_key(task.id))?;
            }
            targets
        };
        tx.commit()?;

        Ok(removed)
    }

    /// Closes the database and releases its lock
    pub fn close(self) -> Result<()> {
        self.kv.close()?;
        Ok(())
    }
}
