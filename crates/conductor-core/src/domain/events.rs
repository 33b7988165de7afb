//! Events published on the `EventBus`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Mode, PowerState, Task};

/// Name under which listeners subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskInterrupted,
    ModeChanged,
    PowerStateChanged,
}

impl EventName {
    pub const ALL: [EventName; 6] = [
        EventName::TaskStarted,
        EventName::TaskCompleted,
        EventName::TaskFailed,
        EventName::TaskInterrupted,
        EventName::ModeChanged,
        EventName::PowerStateChanged,
    ];
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Something the scheduler did.
///
/// Task events carry a snapshot of the task at the moment of the transition.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    TaskStarted {
        task: Task,
    },
    TaskCompleted {
        task: Task,
    },
    /// Actuator failure, timeout, eviction or shutdown; see `task.failure_reason`.
    TaskFailed {
        task: Task,
    },
    /// `requeued` is true when a resumable task went back to the queue.
    TaskInterrupted {
        task: Task,
        requeued: bool,
    },
    ModeChanged {
        old: Mode,
        new: Mode,
    },
    PowerStateChanged {
        old: PowerState,
        new: PowerState,
        level: u8,
    },
}

impl SchedulerEvent {
    pub fn name(&self) -> EventName {
        match self {
            SchedulerEvent::TaskStarted { .. } => EventName::TaskStarted,
            SchedulerEvent::TaskCompleted { .. } => EventName::TaskCompleted,
            SchedulerEvent::TaskFailed { .. } => EventName::TaskFailed,
            SchedulerEvent::TaskInterrupted { .. } => EventName::TaskInterrupted,
            SchedulerEvent::ModeChanged { .. } => EventName::ModeChanged,
            SchedulerEvent::PowerStateChanged { .. } => EventName::PowerStateChanged,
        }
    }
}
