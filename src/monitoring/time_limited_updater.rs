//! # Time-Limited Updater
//!
//! Applies an async update to the eligible items of a worklist, highest priority
//! first, until a deadline passes. Items that were not updated (ineligible, or
//! not reached in time) come back unchanged, and the output keeps input order.

use chrono::{DateTime, Utc};
use indexmap::map::Entry;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeLimitedUpdateError {
    #[error("Duplicate key in update worklist: {0}")]
    DuplicateKey(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult<A> {
    /// Every input item, updated or not, in input order
    pub updated_list: Vec<A>,
    pub total_eligible: usize,
    pub total_updated: usize,
    /// True when every eligible item was updated before the deadline
    pub fully_updated: bool,
}

/// Run `update_op` over the items accepted by `is_eligible`, ordered by
/// `priority`, checking `end_time` before each update.
pub async fn update<A, K, F, Fut>(
    inputs: Vec<A>,
    key_of: impl Fn(&A) -> K,
    is_eligible: impl Fn(&A) -> bool,
    priority: impl Fn(&A, &A) -> Ordering,
    mut update_op: F,
    end_time: DateTime<Utc>,
) -> Result<UpdateResult<A>, TimeLimitedUpdateError>
where
    K: Eq + Hash + Display,
    F: FnMut(A) -> Fut,
    Fut: Future<Output = A>,
{
    let mut slots: IndexMap<K, Option<A>> = IndexMap::with_capacity(inputs.len());
    for item in inputs {
        match slots.entry(key_of(&item)) {
            Entry::Occupied(entry) => {
                return Err(TimeLimitedUpdateError::DuplicateKey(entry.key().to_string()));
            }
            Entry::Vacant(entry) => {
                entry.insert(Some(item));
            }
        }
    }

    let mut eligible: Vec<usize> = slots
        .values()
        .enumerate()
        .filter(|(_, item)| item.as_ref().is_some_and(&is_eligible))
        .map(|(index, _)| index)
        .collect();

    eligible.sort_by(|a, b| match (&slots[*a], &slots[*b]) {
        (Some(a), Some(b)) => priority(a, b),
        _ => Ordering::Equal,
    });

    let total_eligible = eligible.len();
    let mut total_updated = 0;

    for index in eligible {
        if Utc::now() >= end_time {
            debug!(
                total_eligible,
                total_updated, "Update deadline reached before all eligible items were updated"
            );
            break;
        }

        let Some((_, slot)) = slots.get_index_mut(index) else {
            continue;
        };
        if let Some(item) = slot.take() {
            *slot = Some(update_op(item).await);
            total_updated += 1;
        }
    }

    Ok(UpdateResult {
        updated_list: slots.into_values().flatten().collect(),
        total_eligible,
        total_updated,
        fully_updated: total_updated == total_eligible,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
        priority: i32,
        ready: bool,
        touched: bool,
    }

    fn item(id: u32, priority: i32, ready: bool) -> Item {
        Item {
            id,
            priority,
            ready,
            touched: false,
        }
    }

    #[tokio::test]
    async fn test_far_deadline_updates_all_eligible_in_priority_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = order.clone();

        let result = update(
            vec![item(1, 3, true), item(2, 1, false), item(3, 2, true), item(4, 0, true)],
            |i| i.id,
            |i| i.ready,
            |a, b| a.priority.cmp(&b.priority),
            move |mut i| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(i.id);
                    i.touched = true;
                    i
                }
            },
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();

        assert_eq!(*order.lock().unwrap(), vec![4, 3, 1]);
        assert_eq!(result.total_eligible, 3);
        assert_eq!(result.total_updated, 3);
        assert!(result.fully_updated);
        let ids: Vec<u32> = result.updated_list.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(!result.updated_list[1].touched);
        assert!(result.updated_list[0].touched);
    }

    #[tokio::test]
    async fn test_past_deadline_updates_nothing() {
        let inputs = vec![item(1, 0, true), item(2, 0, true)];
        let result = update(
            inputs.clone(),
            |i| i.id,
            |i| i.ready,
            |a, b| a.priority.cmp(&b.priority),
            |mut i| async move {
                i.touched = true;
                i
            },
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

        assert_eq!(result.total_eligible, 2);
        assert_eq!(result.total_updated, 0);
        assert!(!result.fully_updated);
        assert_eq!(result.updated_list, inputs);
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_rejected() {
        let result = update(
            vec![item(7, 0, true), item(7, 1, true)],
            |i| i.id,
            |_| true,
            |a, b| a.priority.cmp(&b.priority),
            |i| async move { i },
            Utc::now() + Duration::hours(1),
        )
        .await;

        assert_eq!(result, Err(TimeLimitedUpdateError::DuplicateKey("7".to_string())));
    }

    #[tokio::test]
    async fn test_no_eligible_items_is_fully_updated() {
        let result = update(
            vec![item(1, 0, false)],
            |i| i.id,
            |i| i.ready,
            |a, b| a.priority.cmp(&b.priority),
            |i| async move { i },
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();
        assert_eq!(result.total_eligible, 0);
        assert!(result.fully_updated);
    }
}
