//! Status - point-in-time view of the scheduler
//!
//! Snapshots are plain data, safe to hand to any task or serialize.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Mode, PowerState, Priority, TaskId, TaskKind, TaskState};

/// Lifetime counters.
///
/// `failed` includes evictions and timeouts; `interrupted` counts only
/// interruptions that ended a task (requeued ones are in `requeued`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub interrupted: u64,
    pub evicted: u64,
    pub timed_out: u64,
    pub preemptions: u64,
    pub requeued: u64,
}

impl TaskCounts {
    /// Tasks that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed + self.interrupted
    }
}

/// The running task, as seen by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub kind: TaskKind,
    pub priority: Priority,
    pub state: TaskState,
    pub running_for_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub taken_at: DateTime<Utc>,
    pub mode: Mode,
    pub running: Option<TaskSummary>,
    pub queue_len: usize,
    pub power: PowerState,
    pub power_level: u8,
    pub autonomous: bool,
    pub tick_interval_ms: u64,
    pub counts: TaskCounts,
    pub mode_time_ms: BTreeMap<Mode, u64>,
}

impl SchedulerStatus {
    /// Every submitted task is either finished, pending or running.
    pub fn is_accounted(&self) -> bool {
        let running = u64::from(self.running.is_some());
        self.counts.finished() + self.queue_len as u64 + running == self.counts.submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(counts: TaskCounts, queue_len: usize, running: bool) -> SchedulerStatus {
        SchedulerStatus {
            taken_at: Utc::now(),
            mode: Mode::Idle,
            running: running.then(|| TaskSummary {
                id: TaskId::from_ulid(ulid::Ulid::new()),
                kind: TaskKind::Expression,
                priority: Priority::clamped(5),
                state: TaskState::Running,
                running_for_ms: 0,
            }),
            queue_len,
            power: PowerState::Normal,
            power_level: 100,
            autonomous: true,
            tick_interval_ms: 1000,
            counts,
            mode_time_ms: BTreeMap::new(),
        }
    }

    #[test]
    fn accounting_balances() {
        let counts = TaskCounts {
            submitted: 6,
            completed: 2,
            failed: 1,
            interrupted: 1,
            ..Default::default()
        };
        assert!(status(counts, 1, true).is_accounted());
        assert!(!status(counts, 1, false).is_accounted());
    }

    #[test]
    fn serializes_modes_as_keys() {
        let mut s = status(TaskCounts::default(), 0, false);
        s.mode_time_ms.insert(Mode::InputCapture, 1500);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["mode_time_ms"]["input-capture"], 1500);
        assert_eq!(json["power"], "normal");
        assert!(json["running"].is_null());
    }
}
