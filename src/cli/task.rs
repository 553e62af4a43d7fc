//! Task CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::output::Output;
use crate::domain::Task;
use crate::storage::{StoreError, TaskStore};

fn bullets(tasks: &[Task]) -> impl Iterator<Item = String> + '_ {
    tasks.iter().map(|t| format!("- {}", t.description))
}

/// Unix seconds `hours` before `now`, clamped to `i64::MIN` past chrono's range
fn completed_cutoff(now: DateTime<Utc>, hours: u32) -> i64 {
    Duration::try_hours(i64::from(hours))
        .and_then(|window| now.checked_sub_signed(window))
        .map_or(i64::MIN, |since| since.timestamp())
}

pub fn add(store: &mut TaskStore, output: &Output, descriptions: &[String]) -> Result<()> {
    // Each add is its own transaction, so reject the batch up front
    if descriptions.iter().any(|d| d.trim().is_empty()) {
        return Err(StoreError::EmptyDescription.into());
    }

    let mut added = Vec::with_capacity(descriptions.len());
    for description in descriptions {
        let task = store
            .add_task(description)
            .with_context(|| format!("Failed to add task: {}", description))?;
        debug!(id = task.id, "added task");
        added.push(task);
    }

    if output.is_json() {
        output.data(&added)?;
    } else {
        output.list("Added the following tasks:", bullets(&added));
    }

    Ok(())
}

pub fn list(store: &TaskStore, output: &Output) -> Result<()> {
    let tasks = store.list_incomplete()?;
    debug!(count = tasks.len(), "listed incomplete tasks");

    if output.is_json() {
        let items: Vec<_> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                serde_json::json!({
                    "position": i + 1,
                    "description": t.description,
                })
            })
            .collect();
        output.data(&items)?;
    } else if tasks.is_empty() {
        println!("You have no incomplete tasks.");
    } else {
        output.list(
            "You have the following incomplete tasks:",
            tasks
                .iter()
                .enumerate()
                .map(|(i, t)| format!("{}. {}", i + 1, t.description)),
        );
    }

    Ok(())
}

pub fn completed(store: &TaskStore, output: &Output, hours: u32) -> Result<()> {
    let since = completed_cutoff(Utc::now(), hours);
    let tasks = store.list_completed_since(since)?;
    debug!(since, count = tasks.len(), "listed completed tasks");

    if output.is_json() {
        let items: Vec<_> = tasks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "description": t.description,
                    "completed_at": t.completed_at(),
                })
            })
            .collect();
        output.data(&items)?;
    } else if tasks.is_empty() {
        println!("You have not finished any tasks in the last {}h.", hours);
    } else {
        output.list(
            &format!("You have finished the following tasks since {}h ago:", hours),
            bullets(&tasks),
        );
    }

    Ok(())
}

pub fn complete(store: &mut TaskStore, output: &Output, positions: &[usize]) -> Result<()> {
    let tasks = store.complete_tasks(positions)?;
    debug!(?positions, "completed tasks");

    if output.is_json() {
        output.data(&tasks)?;
    } else {
        output.list("Marked the following tasks as complete:", bullets(&tasks));
    }

    Ok(())
}

pub fn remove(store: &mut TaskStore, output: &Output, positions: &[usize]) -> Result<()> {
    let tasks = store.remove_tasks(positions)?;
    debug!(?positions, "removed tasks");

    if output.is_json() {
        output.data(&tasks)?;
    } else {
        output.list("Deleted the following incomplete tasks:", bullets(&tasks));
    }

    Ok(())
}
