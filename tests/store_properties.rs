//! Property tests for the task store
//!
//! These drive the library directly against a fresh database per case.

use proptest::prelude::*;
use tempfile::TempDir;

use task_cli::{FixedClock, TaskStore};

const NOW: i64 = 1_700_000_000;

fn open_store(dir: &TempDir) -> TaskStore<FixedClock> {
    TaskStore::open_with_clock(dir.path().join("tasks.db"), FixedClock::new(NOW)).unwrap()
}

fn description() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,20}[a-zA-Z0-9]"
}

/// Distinct 1-indexed positions into a list of `len` tasks, in random order
fn positions(len: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((1..=len).collect::<Vec<_>>())
        .prop_shuffle()
        .prop_flat_map(move |all| (0..=len).prop_map(move |n| all[..n].to_vec()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn added_tasks_list_back_in_order(descriptions in prop::collection::vec(description(), 0..12)) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        for d in &descriptions {
            store.add_task(d).unwrap();
        }

        let listed = store.list_incomplete().unwrap();
        let listed_descriptions: Vec<_> = listed.iter().map(|t| t.description.clone()).collect();
        prop_assert_eq!(listed_descriptions, descriptions);
        prop_assert!(listed.iter().all(|t| t.completion_time == 0));
        prop_assert!(listed.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn batch_positions_resolve_against_one_snapshot(
        (count, batch) in (1usize..10).prop_flat_map(|n| (Just(n), positions(n)))
    ) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let names: Vec<String> = (1..=count).map(|i| format!("task {i}")).collect();
        for name in &names {
            store.add_task(name).unwrap();
        }

        let completed = store.complete_tasks(&batch).unwrap();
        let expected: Vec<_> = batch.iter().map(|&p| names[p - 1].clone()).collect();
        let got: Vec<_> = completed.iter().map(|t| t.description.clone()).collect();
        prop_assert_eq!(got, expected);
        prop_assert!(completed.iter().all(|t| t.completion_time == NOW));

        let remaining: Vec<_> = store
            .list_incomplete()
            .unwrap()
            .into_iter()
            .map(|t| t.description)
            .collect();
        let kept: Vec<_> = names
            .iter()
            .enumerate()
            .filter(|(i, _)| !batch.contains(&(i + 1)))
            .map(|(_, n)| n.clone())
            .collect();
        prop_assert_eq!(remaining, kept);

        let done = store.list_completed_since(0).unwrap();
        prop_assert_eq!(done.len() + count - batch.len(), count);
    }

    #[test]
    fn invalid_batch_leaves_store_untouched(count in 0usize..6, bad in 0usize..20, good in 1usize..6) {
        prop_assume!(bad == 0 || bad > count);

        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        for i in 0..count {
            store.add_task(&format!("task {i}")).unwrap();
        }
        let before = store.list_incomplete().unwrap();

        let batch = [good.min(count.max(1)), bad];
        prop_assert!(store.complete_tasks(&batch).unwrap_err().is_validation());
        prop_assert!(store.remove_tasks(&batch).unwrap_err().is_validation());

        prop_assert_eq!(store.list_incomplete().unwrap(), before);
        prop_assert!(store.list_completed_since(i64::MIN).unwrap().is_empty());
    }
}
