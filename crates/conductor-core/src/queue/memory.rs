//! In-memory priority queue of pending tasks.

use std::cmp::{Ordering, Reverse};

use crate::domain::{Priority, Task, TaskId, TaskState};

/// Queue entry: the task plus the bookkeeping that fixes its position.
#[derive(Debug, Clone)]
struct Entry {
    task: Task,
    /// Resumed tasks go to the front of their priority band.
    front: bool,
    /// Insertion counter; breaks ties between equal `submitted_at`.
    seq: u64,
}

impl Entry {
    /// Ascending rank; the highest-ranked entry is served first.
    fn rank(&self) -> (Priority, bool, Reverse<std::time::Instant>, Reverse<u64>) {
        (
            self.task.priority,
            self.front,
            Reverse(self.task.submitted_at),
            Reverse(self.seq),
        )
    }

    fn cmp_rank(&self, other: &Entry) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Pending tasks ordered by priority, then arrival.
///
/// Design:
/// - Sorted `Vec`, lowest rank first, so the next task is always `last()`.
/// - Higher priority first; equal priority is FIFO by `submitted_at`.
/// - Removal only through `pop_highest`, `evict_below`, `remove` and `drain`,
///   so every task that leaves the queue is accounted for by the caller.
#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: Vec<Entry>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping the priority/FIFO order. O(n).
    pub fn insert(&mut self, task: Task) {
        self.insert_entry(task, false);
    }

    /// Insert at the front of the task's priority band.
    ///
    /// Used for resumed tasks. Among several front-inserted tasks of the same
    /// priority, the earliest submitted still goes first.
    pub fn insert_front(&mut self, task: Task) {
        self.insert_entry(task, true);
    }

    fn insert_entry(&mut self, task: Task, front: bool) {
        debug_assert_eq!(task.state, TaskState::Pending);
        let entry = Entry {
            task,
            front,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let pos = self
            .entries
            .partition_point(|e| e.cmp_rank(&entry) == Ordering::Less);
        self.entries.insert(pos, entry);
    }

    pub fn peek_highest(&self) -> Option<&Task> {
        self.entries.last().map(|e| &e.task)
    }

    pub fn pop_highest(&mut self) -> Option<Task> {
        self.entries.pop().map(|e| e.task)
    }

    /// Remove every task with priority strictly below `min_priority`.
    ///
    /// Returns the evicted tasks, highest first.
    pub fn evict_below(&mut self, min_priority: Priority) -> Vec<Task> {
        // sorted ascending: everything below `min_priority` is a prefix
        let cut = self
            .entries
            .partition_point(|e| e.task.priority < min_priority);
        self.entries
            .drain(..cut)
            .rev()
            .map(|e| e.task)
            .collect()
    }

    /// Remove a specific task (cancellation).
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let pos = self.entries.iter().position(|e| e.task.id == id)?;
        Some(self.entries.remove(pos).task)
    }

    /// Remove everything, highest first (shutdown).
    pub fn drain(&mut self) -> Vec<Task> {
        self.entries.drain(..).rev().map(|e| e.task).collect()
    }

    #[cfg(test)]
    pub fn contains(&self, id: TaskId) -> bool {
        self.entries.iter().any(|e| e.task.id == id)
    }

    /// Pending tasks in service order (highest first).
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.entries.iter().rev().map(|e| &e.task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::domain::{TaskKind, TaskRequest};
    use rstest::rstest;
    use ulid::Ulid;

    fn task(priority: i64, submitted_at: Instant) -> Task {
        Task::new(
            TaskId::from_ulid(Ulid::new()),
            TaskRequest::new(TaskKind::Expression, priority),
            submitted_at,
        )
    }

    fn priorities(q: &TaskQueue) -> Vec<u8> {
        q.iter().map(|t| t.priority.get()).collect()
    }

    #[test]
    fn higher_priority_first() {
        let t0 = Instant::now();
        let mut q = TaskQueue::new();
        for p in [3, 9, 1, 7, 5] {
            q.insert(task(p, t0));
        }
        assert_eq!(priorities(&q), vec![9, 7, 5, 3, 1]);
        assert_eq!(q.peek_highest().map(|t| t.priority.get()), Some(9));
    }

    #[test]
    fn equal_priority_is_fifo() {
        let t0 = Instant::now();
        let mut q = TaskQueue::new();
        let first = task(4, t0);
        let second = task(4, t0 + Duration::from_millis(1));
        let (a, b) = (first.id, second.id);
        // inserted out of arrival order on purpose
        q.insert(second);
        q.insert(first);

        assert_eq!(q.pop_highest().map(|t| t.id), Some(a));
        assert_eq!(q.pop_highest().map(|t| t.id), Some(b));
        assert!(q.pop_highest().is_none());
    }

    #[test]
    fn identical_timestamps_fall_back_to_insertion_order() {
        let t0 = Instant::now();
        let mut q = TaskQueue::new();
        let ids: Vec<_> = (0..5)
            .map(|_| {
                let t = task(6, t0);
                let id = t.id;
                q.insert(t);
                id
            })
            .collect();

        let popped: Vec<_> = std::iter::from_fn(|| q.pop_highest().map(|t| t.id)).collect();
        assert_eq!(popped, ids);
    }

    #[test]
    fn insert_front_leads_its_band_only() {
        let t0 = Instant::now();
        let mut q = TaskQueue::new();
        let early = task(5, t0);
        let resumed = task(5, t0 + Duration::from_secs(3));
        let higher = task(8, t0 + Duration::from_secs(5));
        let resumed_id = resumed.id;
        q.insert(early);
        q.insert(higher);
        q.insert_front(resumed);

        let order: Vec<_> = q.iter().map(|t| t.id).collect();
        assert_eq!(order[1], resumed_id);
        assert_eq!(priorities(&q), vec![8, 5, 5]);
    }

    #[rstest]
    #[case::nothing_below(1, 0)]
    #[case::strictly_below(9, 3)]
    #[case::top_band_only(10, 4)]
    fn evict_below_is_strict(#[case] min: i64, #[case] expected: usize) {
        let t0 = Instant::now();
        let mut q = TaskQueue::new();
        for p in [9, 10, 8, 5, 1] {
            q.insert(task(p, t0));
        }
        let min = Priority::clamped(min);
        let evicted = q.evict_below(min);

        assert_eq!(evicted.len(), expected);
        assert!(evicted.iter().all(|t| t.priority < min));
        assert!(q.iter().all(|t| t.priority >= min));
        assert_eq!(evicted.len() + q.len(), 5);
    }

    #[test]
    fn remove_and_drain_account_for_everything() {
        let t0 = Instant::now();
        let mut q = TaskQueue::new();
        let keep = task(2, t0);
        let target = task(6, t0);
        let target_id = target.id;
        q.insert(keep);
        q.insert(target);
        q.insert(task(9, t0));

        assert!(q.contains(target_id));
        assert_eq!(q.remove(target_id).map(|t| t.id), Some(target_id));
        assert!(q.remove(target_id).is_none());

        let drained = q.drain();
        assert_eq!(
            drained.iter().map(|t| t.priority.get()).collect::<Vec<_>>(),
            vec![9, 2]
        );
        assert!(q.is_empty());
    }
}
