use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{RunId, TaskId, TaskState};

/// What the actuator should do. Closed set; per-kind behaviour is configured
/// through `ModeMap` and the resumable set, never by branching on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Expression,
    InputCapture,
    Locomotion,
    Notification,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Expression,
        TaskKind::InputCapture,
        TaskKind::Locomotion,
        TaskKind::Notification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Expression => "expression",
            TaskKind::InputCapture => "input-capture",
            TaskKind::Locomotion => "locomotion",
            TaskKind::Notification => "notification",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task kind '{0}'")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownTaskKind(s.to_string()))
    }
}

/// Task priority, 1 (lowest) to 10 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(1);
    pub const MAX: Priority = Priority(10);

    /// Clamp any integer into 1..=10. Admission never rejects a priority.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN.0 as i64, Self::MAX.0 as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// How far `self` is above `other` (negative if below).
    pub fn margin_over(self, other: Priority) -> i16 {
        self.0 as i16 - other.0 as i16
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a producer hands to `submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub kind: TaskKind,

    /// Any integer; clamped into 1..=10 on submission.
    pub priority: i64,

    /// If absent the task runs until the actuator reports or it is superseded.
    #[serde(default)]
    pub requested_duration: Option<Duration>,

    /// Forwarded to the actuator untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TaskRequest {
    pub fn new(kind: TaskKind, priority: i64) -> Self {
        Self {
            kind,
            priority,
            requested_duration: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.requested_duration = Some(duration);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// A submitted task.
///
/// Producers own `kind`/`priority`/`requested_duration`/`payload`; the
/// scheduler owns the lifecycle fields and changes them only through the
/// transition methods below.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub priority: Priority,
    pub requested_duration: Option<Duration>,
    pub payload: serde_json::Value,

    pub state: TaskState,

    /// Only populated in `Failed`.
    pub failure_reason: Option<String>,

    /// Handle of the current (or last) actuator run.
    pub run: Option<RunId>,

    #[serde(skip)]
    pub submitted_at: Instant,
    #[serde(skip)]
    pub started_at: Option<Instant>,
    #[serde(skip)]
    pub completed_at: Option<Instant>,
}

impl Task {
    pub fn new(id: TaskId, request: TaskRequest, submitted_at: Instant) -> Self {
        Self {
            id,
            kind: request.kind,
            priority: Priority::clamped(request.priority),
            requested_duration: request.requested_duration,
            payload: request.payload,
            state: TaskState::Pending,
            failure_reason: None,
            run: None,
            submitted_at,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self, run: RunId, now: Instant) {
        self.state = TaskState::Running;
        self.run = Some(run);
        self.started_at = Some(now);
        self.completed_at = None;
    }

    pub fn complete(&mut self, now: Instant) {
        self.state = TaskState::Completed;
        self.completed_at = Some(now);
    }

    pub fn fail(&mut self, reason: impl Into<String>, now: Instant) {
        self.state = TaskState::Failed;
        self.failure_reason = Some(reason.into());
        self.completed_at = Some(now);
    }

    pub fn interrupt(&mut self, now: Instant) {
        self.state = TaskState::Interrupted;
        self.completed_at = Some(now);
    }

    /// Back to `Pending` after an interruption. `submitted_at` is kept so the
    /// task returns to the front of its priority band.
    pub fn resume(&mut self) {
        self.state = TaskState::Pending;
        self.started_at = None;
        self.completed_at = None;
    }

    pub fn running_for(&self, now: Instant) -> Option<Duration> {
        self.started_at.map(|t| now.saturating_duration_since(t))
    }
}
