//! Weighted task selection.
//!
//! Each service's task table is wrapped in a [`TaskSelector`] that samples one
//! task per iteration with probability `weight / total_weight`.

use std::sync::Arc;

use rand::Rng;

use crate::task::TaskDefinition;

/// Task selector that chooses tasks based on weighted distribution.
///
/// # Example
/// ```
/// use service_loadtest::selector::TaskSelector;
/// use service_loadtest::services::Service;
///
/// let selector = TaskSelector::new(Service::Order.tasks());
/// let task = selector.select(&mut rand::thread_rng());
/// // 40% "list orders", 30% "get order by id", 20% "get orders by user", 10% "health check"
/// assert!(task.weight > 0);
/// ```
#[derive(Clone)]
pub struct TaskSelector {
    tasks: Arc<Vec<TaskDefinition>>,
    cumulative_weights: Arc<Vec<u64>>,
    total_weight: u64,
}

impl TaskSelector {
    /// Create a new selector over a fixed task table.
    ///
    /// # Panics
    /// Panics if the table is empty or if any weight is zero. Task tables are
    /// static, so either is a programming error rather than a runtime condition.
    pub fn new(tasks: Vec<TaskDefinition>) -> Self {
        if tasks.is_empty() {
            panic!("Cannot create TaskSelector with empty task list");
        }

        let mut cumulative = Vec::with_capacity(tasks.len());
        let mut sum = 0u64;

        for task in &tasks {
            if task.weight == 0 {
                panic!(
                    "Task '{}' has zero weight. Remove tasks with zero weight.",
                    task.name
                );
            }
            sum += u64::from(task.weight);
            cumulative.push(sum);
        }

        Self {
            tasks: Arc::new(tasks),
            cumulative_weights: Arc::new(cumulative),
            total_weight: sum,
        }
    }

    /// Select a task based on weighted random distribution.
    ///
    /// Uses a binary search over the cumulative weights.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &TaskDefinition {
        let random = rng.gen_range(0..self.total_weight);
        let index = self.cumulative_weights.partition_point(|&weight| weight <= random);
        &self.tasks[index]
    }

    /// Calculate the selection probability for each task.
    pub fn probabilities(&self) -> Vec<(&'static str, f64)> {
        self.tasks
            .iter()
            .map(|t| (t.name, f64::from(t.weight) / self.total_weight as f64))
            .collect()
    }
}
