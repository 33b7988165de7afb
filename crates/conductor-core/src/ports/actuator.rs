//! Actuator port - the single exclusive device the scheduler allocates.
//!
//! The scheduler never waits on the actuator. `start` hands over a command
//! plus a `CompletionReporter`; the actuator reports back later through the
//! reporter, which feeds the scheduler's completion channel. `stop` is
//! fire-and-forget.
//!
//! Transport concerns (reconnects, retries with backoff) belong behind this
//! trait and never reach the scheduler.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::domain::{ActuatorError, RunId, TaskId, TaskKind};

/// One run request for the actuator.
#[derive(Debug, Clone)]
pub struct ActuatorCommand {
    pub run: RunId,
    pub task: TaskId,
    pub kind: TaskKind,
    pub payload: serde_json::Value,
    pub duration: Option<Duration>,
}

/// Result of one run, delivered to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub run: RunId,
    pub task: TaskId,
    pub result: Result<(), ActuatorError>,
}

/// Exactly-once completion channel for a single `start` call.
///
/// Reporting consumes the reporter. Dropping it without reporting sends
/// `ActuatorError::Dropped`, so the scheduler always hears back once.
#[derive(Debug)]
pub struct CompletionReporter {
    run: RunId,
    task: TaskId,
    tx: Option<mpsc::UnboundedSender<Completion>>,
}

impl CompletionReporter {
    pub fn new(run: RunId, task: TaskId, tx: mpsc::UnboundedSender<Completion>) -> Self {
        Self {
            run,
            task,
            tx: Some(tx),
        }
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn complete(self) {
        self.report(Ok(()));
    }

    pub fn fail(self, error: ActuatorError) {
        self.report(Err(error));
    }

    pub fn report(mut self, result: Result<(), ActuatorError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<(), ActuatorError>) {
        if let Some(tx) = self.tx.take() {
            // receiver gone means the scheduler has shut down
            let _ = tx.send(Completion {
                run: self.run,
                task: self.task,
                result,
            });
        }
    }
}

impl Drop for CompletionReporter {
    fn drop(&mut self) {
        self.send(Err(ActuatorError::Dropped));
    }
}

/// The device capability.
///
/// Both methods are called from the scheduling loop and must return promptly;
/// real work belongs on the actuator's own task.
pub trait Actuator: Send + Sync {
    /// Begin a run. Must eventually report through `done` (or drop it).
    fn start(&self, command: ActuatorCommand, done: CompletionReporter);

    /// Request that a run stop. The scheduler does not wait for it.
    fn stop(&self, run: RunId);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn reporter() -> (CompletionReporter, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let r = CompletionReporter::new(
            RunId::from_ulid(Ulid::new()),
            TaskId::from_ulid(Ulid::new()),
            tx,
        );
        (r, rx)
    }

    #[test]
    fn report_sends_once() {
        let (r, mut rx) = reporter();
        let run = r.run();
        r.complete();

        let c = rx.try_recv().unwrap();
        assert_eq!(c.run, run);
        assert_eq!(c.result, Ok(()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropping_unreported_sends_dropped() {
        let (r, mut rx) = reporter();
        drop(r);

        let c = rx.try_recv().unwrap();
        assert_eq!(c.result, Err(ActuatorError::Dropped));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failure_carries_actuator_error() {
        let (r, mut rx) = reporter();
        r.fail(ActuatorError::Device("led bus stalled".into()));

        let c = rx.try_recv().unwrap();
        assert_eq!(c.result, Err(ActuatorError::Device("led bus stalled".into())));
    }
}
