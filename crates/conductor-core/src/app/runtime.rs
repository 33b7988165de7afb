//! SchedulerRuntime - drives a `Scheduler` on a tokio task.
//!
//! The runtime task is the only owner of the scheduler. Everything else talks
//! to it through `SchedulerHandle`, which sends `Command`s over an unbounded
//! channel; queries reply through a oneshot.
//!
//! - `shutdown_tx` を drop しても runtime は止まる
//! - `shutdown_and_join()` で scheduler の後始末と power sampler の終了を待てる

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};

use super::event_bus::{Listener, ListenerFailure, SubscriptionId};
use super::power_loop::power_sampler_loop;
use super::scheduler::Scheduler;
use super::status::SchedulerStatus;
use crate::domain::{EventName, SchedulerError, Task, TaskId, TaskRequest};
use crate::ports::{Clock, IdGenerator, PowerSource};

/// Messages applied by the runtime task between ticks.
pub(crate) enum Command {
    Submit(Task),
    Cancel {
        id: TaskId,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<SchedulerStatus>,
    },
    History {
        reply: oneshot::Sender<Vec<Task>>,
    },
    Subscribe {
        name: EventName,
        listener: Arc<dyn Listener>,
        errors: Option<mpsc::UnboundedSender<ListenerFailure>>,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<bool>,
    },
    SetAutonomous(bool),
    PowerLevel(u8),
}

/// Cheap, cloneable front end to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Command>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl SchedulerHandle {
    /// Enqueue a task. Never blocks and never fails.
    ///
    /// The id is assigned here, so it is known before the runtime has seen
    /// the task. Submissions to a stopped runtime are logged and dropped.
    pub fn submit(&self, request: TaskRequest) -> TaskId {
        let task = Task::new(self.ids.generate_task_id(), request, self.clock.now());
        let id = task.id;
        if self.tx.send(Command::Submit(task)).is_err() {
            tracing::warn!(task_id = %id, "scheduler is not running; submission dropped");
        }
        id
    }

    pub async fn cancel(&self, id: TaskId) -> Result<bool, SchedulerError> {
        self.request(|reply| Command::Cancel { id, reply }).await
    }

    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Finished tasks, most recent last.
    pub async fn history(&self) -> Result<Vec<Task>, SchedulerError> {
        self.request(|reply| Command::History { reply }).await
    }

    /// Register a listener for `name`. Listeners run on the scheduling task
    /// and must not block.
    pub async fn subscribe(
        &self,
        name: EventName,
        listener: Arc<dyn Listener>,
        errors: Option<mpsc::UnboundedSender<ListenerFailure>>,
    ) -> Result<SubscriptionId, SchedulerError> {
        self.request(|reply| Command::Subscribe {
            name,
            listener,
            errors,
            reply,
        })
        .await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, SchedulerError> {
        self.request(|reply| Command::Unsubscribe { id, reply }).await
    }

    /// Pause or resume autonomous decisions. Completions are still applied
    /// while paused.
    pub fn set_autonomous(&self, enabled: bool) {
        let _ = self.tx.send(Command::SetAutonomous(enabled));
    }

    /// Push a power sample directly, bypassing the sampler.
    pub fn report_power_level(&self, level: u8) {
        let _ = self.tx.send(Command::PowerLevel(level));
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| SchedulerError::Stopped)?;
        rx.await.map_err(|_| SchedulerError::Stopped)
    }
}

/// Running scheduler plus its optional power sampler.
pub struct SchedulerRuntime {
    handle: SchedulerHandle,
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl SchedulerRuntime {
    /// Spawn the scheduling task (and the sampler when a source is given).
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(scheduler: Scheduler, power_source: Option<Arc<dyn PowerSource>>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = SchedulerHandle {
            tx: tx.clone(),
            clock: scheduler.clock(),
            ids: scheduler.id_generator(),
        };

        let mut joins = Vec::with_capacity(2);
        if let Some(source) = power_source {
            let every = scheduler.config().power.sample_interval();
            let shutdown = shutdown_rx.clone();
            joins.push(tokio::spawn(power_sampler_loop(source, every, tx, shutdown)));
        }
        joins.push(tokio::spawn(scheduler_loop(scheduler, rx, shutdown_rx)));

        Self {
            handle,
            shutdown_tx,
            joins,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loops may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shut down and wait: the running task is interrupted, pending tasks
    /// fail with reason "shutdown", and the mode returns to Idle.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "scheduler task ended abnormally");
            }
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn scheduler_loop(
    mut scheduler: Scheduler,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut period = scheduler.tick_interval();
    let mut interval = ticker(period);
    tracing::info!(interval_ms = period.as_millis() as u64, "scheduler started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                // sender dropped counts as shutdown
                if changed.is_err() {
                    break;
                }
            }
            _ = interval.tick() => {
                scheduler.tick();
            }
            command = commands.recv() => {
                let Some(command) = command else { break };
                apply(&mut scheduler, command);
            }
        }

        let next = scheduler.tick_interval();
        if next != period {
            tracing::debug!(interval_ms = next.as_millis() as u64, "tick interval changed");
            period = next;
            interval = ticker(period);
        }
    }

    // submissions already accepted by a handle must still be accounted for
    commands.close();
    while let Ok(command) = commands.try_recv() {
        apply(&mut scheduler, command);
    }

    scheduler.shutdown();
    tracing::info!("scheduler stopped");
}

fn apply(scheduler: &mut Scheduler, command: Command) {
    // a dropped reply receiver only means the caller stopped waiting
    match command {
        Command::Submit(task) => {
            scheduler.admit(task);
        }
        Command::Cancel { id, reply } => {
            let _ = reply.send(scheduler.cancel(id));
        }
        Command::Status { reply } => {
            let _ = reply.send(scheduler.status());
        }
        Command::History { reply } => {
            let _ = reply.send(scheduler.history());
        }
        Command::Subscribe {
            name,
            listener,
            errors,
            reply,
        } => {
            let _ = reply.send(scheduler.subscribe(name, listener, errors));
        }
        Command::Unsubscribe { id, reply } => {
            let _ = reply.send(scheduler.unsubscribe(id));
        }
        Command::SetAutonomous(enabled) => scheduler.set_autonomous(enabled),
        Command::PowerLevel(level) => scheduler.record_power_level(level),
    }
}
