//! Task lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Failed (actuator error or timeout)
/// - Pending -> Running -> Interrupted (preempted, power-critical, cancelled)
/// - Pending -> Failed (evicted under critical power, shutdown)
/// - Pending -> Interrupted (cancelled while queued)
/// - Interrupted -> Pending (resumable kinds only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in the queue.
    Pending,

    /// Holding the actuator. At most one task is in this state.
    Running,

    /// The actuator reported success.
    Completed,

    /// Actuator failure, timeout, eviction or shutdown. See `Task::failure_reason`.
    Failed,

    /// Stopped before finishing.
    Interrupted,
}

impl TaskState {
    /// Is this a terminal state (belongs in history)?
    ///
    /// `Interrupted` is terminal unless the task is resumed, in which case it
    /// goes back to `Pending` before it is ever observed outside the scheduler.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Interrupted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(TaskState::Pending, false)]
    #[case::running(TaskState::Running, false)]
    #[case::completed(TaskState::Completed, true)]
    #[case::failed(TaskState::Failed, true)]
    #[case::interrupted(TaskState::Interrupted, true)]
    fn terminal_states(#[case] state: TaskState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn serializes_as_snake_case() {
        let s = serde_json::to_string(&TaskState::Interrupted).unwrap();
        assert_eq!(s, "\"interrupted\"");
    }
}
