//! Error types.
//!
//! Nothing here is ever allowed to stop the scheduler: actuator errors become
//! `Failed` tasks, listener errors are reported and dropped, power sampling
//! errors skip a sample.

use thiserror::Error;

/// Failure reported by (or on behalf of) the actuator.
///
/// The `Display` string is stored as the task's `failure_reason`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Device(String),

    /// The completion reporter was dropped without reporting.
    #[error("actuator dropped the completion without reporting")]
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PowerSourceError {
    #[error("power source unavailable: {0}")]
    Unavailable(String),

    #[error("power reading out of range: {0}")]
    OutOfRange(f32),
}

/// Error returned by a listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ListenerError {
    pub message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The runtime task has exited; the request could not be answered.
    #[error("scheduler is not running")]
    Stopped,
}
