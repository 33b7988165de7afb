//! Bounded history of finished tasks.

use std::collections::VecDeque;

use crate::domain::Task;

/// Ring buffer of terminal tasks, oldest dropped first.
#[derive(Debug)]
pub struct TaskHistory {
    limit: usize,
    entries: VecDeque<Task>,
}

impl TaskHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: VecDeque::with_capacity(limit.clamp(1, 1024)),
        }
    }

    pub fn push(&mut self, task: Task) {
        debug_assert!(task.state.is_terminal());
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(task);
    }

    /// Oldest first.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Task> {
        self.entries.back()
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
