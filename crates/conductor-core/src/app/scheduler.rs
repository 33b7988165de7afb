//! Scheduler - the decision core
//!
//! Owns every piece of mutable scheduling state: the pending queue, the
//! running task, mode, power classification, history and counters. Nothing
//! here is shared or locked; the runtime task owns the `Scheduler` and feeds
//! it commands between ticks.
//!
//! # Tick
//! 1. Apply actuator completions received since the last tick.
//! 2. Power admission: while Critical, interrupt a running task below
//!    `critical_min_priority`, then evict pending tasks below it.
//! 3. Selection: start the highest pending task, or preempt the running one
//!    when the pending task beats it by more than `preemption_margin`.
//! 4. Timeout: fail an overdue running task and select again.
//! 5. Mode reconciliation: back to Idle (Maintenance while Critical) when
//!    nothing is running.
//!
//! While autonomous mode is off only step 1 runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::mpsc;

use super::config::SchedulerConfig;
use super::event_bus::{EventBus, Listener, ListenerFailure, SubscriptionId};
use super::mode_controller::{ModeController, ModeTransition};
use super::power_monitor::{PowerMonitor, PowerTransition};
use super::status::{SchedulerStatus, TaskCounts, TaskSummary};
use crate::domain::{
    EventName, Mode, PowerState, SchedulerEvent, Task, TaskId, TaskKind, TaskRequest,
};
use crate::ports::{
    Actuator, ActuatorCommand, Clock, Completion, CompletionReporter, IdGenerator,
};
use crate::queue::{TaskHistory, TaskQueue};

/// `failure_reason` of a task that ran past its time limit.
pub const TIMEOUT_REASON: &str = "timeout";
/// `failure_reason` of a task evicted by power admission control.
pub const EVICTED_REASON: &str = "evicted:low-power";
/// `failure_reason` of a task still pending at shutdown.
pub const SHUTDOWN_REASON: &str = "shutdown";

pub struct Scheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    actuator: Arc<dyn Actuator>,

    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,

    queue: TaskQueue,
    running: Option<Task>,
    history: TaskHistory,
    mode: ModeController,
    power: PowerMonitor,
    bus: EventBus,
    counts: TaskCounts,
    autonomous: bool,
}

impl Scheduler {
    /// The config is taken as-is; `SchedulerBuilder` validates it first.
    pub fn new(
        config: SchedulerConfig,
        actuator: Arc<dyn Actuator>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let now = clock.now();
        Self {
            queue: TaskQueue::new(),
            running: None,
            history: TaskHistory::new(config.history_limit),
            mode: ModeController::new(now),
            power: PowerMonitor::new(config.thresholds()),
            bus: EventBus::new(),
            counts: TaskCounts::default(),
            autonomous: true,
            config,
            clock,
            ids,
            actuator,
            completions_tx,
            completions_rx,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn id_generator(&self) -> Arc<dyn IdGenerator> {
        Arc::clone(&self.ids)
    }

    // ------------------------------------------------------------------
    // inputs
    // ------------------------------------------------------------------

    /// Enqueue a new task. Never fails; the priority is clamped.
    pub fn submit(&mut self, request: TaskRequest) -> TaskId {
        let task = Task::new(self.ids.generate_task_id(), request, self.clock.now());
        self.admit(task)
    }

    /// Enqueue a task whose id and submission time were assigned elsewhere
    /// (`SchedulerHandle::submit`).
    pub(crate) fn admit(&mut self, task: Task) -> TaskId {
        let id = task.id;
        tracing::info!(
            task_id = %id,
            kind = %task.kind,
            priority = task.priority.get(),
            "task submitted"
        );
        self.counts.submitted += 1;
        self.queue.insert(task);
        id
    }

    /// Remove a pending task or interrupt the running one.
    ///
    /// A cancelled task always ends `Interrupted`; the resumable policy does
    /// not apply. Returns whether anything changed.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let now = self.clock.now();

        if self.running.as_ref().is_some_and(|t| t.id == id) {
            self.interrupt_running(now, false);
            return true;
        }

        let Some(mut task) = self.queue.remove(id) else {
            return false;
        };
        task.interrupt(now);
        tracing::info!(task_id = %id, "pending task cancelled");
        self.counts.interrupted += 1;
        self.emit(SchedulerEvent::TaskInterrupted {
            task: task.clone(),
            requeued: false,
        });
        self.history.push(task);
        true
    }

    /// Feed one power sample.
    ///
    /// Classification changes are published and may switch the mode to
    /// Maintenance and queue an alert notification. Eviction waits for the
    /// next tick.
    pub fn record_power_level(&mut self, level: u8) {
        let Some(PowerTransition { old, new, level }) = self.power.record(level) else {
            tracing::debug!(level, "power sample");
            return;
        };

        tracing::info!(%old, %new, level, "power state changed");
        self.emit(SchedulerEvent::PowerStateChanged { old, new, level });

        if new == PowerState::Critical && self.running.is_none() {
            let now = self.clock.now();
            self.set_mode(Mode::Maintenance, now);
        }
        if self.config.power.alerts {
            self.submit_power_alert(old, new);
        }
    }

    fn submit_power_alert(&mut self, old: PowerState, new: PowerState) {
        let (priority, severity) = match (old, new) {
            (PowerState::Normal, PowerState::Low) => (self.config.power.low_alert_priority, "warning"),
            (_, PowerState::Critical) => (self.config.power.critical_alert_priority, "error"),
            _ => return,
        };
        let request = TaskRequest::new(TaskKind::Notification, i64::from(priority))
            .with_payload(json!({ "notification": { "type": severity } }));
        let id = self.submit(request);
        tracing::info!(task_id = %id, power = %new, "power alert queued");
    }

    pub fn set_autonomous(&mut self, enabled: bool) {
        if self.autonomous != enabled {
            tracing::info!(enabled, "autonomous scheduling toggled");
        }
        self.autonomous = enabled;
    }

    pub fn subscribe(
        &mut self,
        name: EventName,
        listener: Arc<dyn Listener>,
        errors: Option<mpsc::UnboundedSender<ListenerFailure>>,
    ) -> SubscriptionId {
        self.bus.subscribe(name, listener, errors)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // tick
    // ------------------------------------------------------------------

    pub fn tick(&mut self) {
        let now = self.clock.now();
        self.apply_completions(now);

        if !self.autonomous {
            return;
        }

        if self.power.state() == PowerState::Critical {
            self.enforce_critical_power(now);
        }
        self.select(now);
        if self.expire_overdue(now) {
            self.select(now);
        }
        self.reconcile_mode(now);
    }

    /// Period the runtime should wait between ticks.
    pub fn tick_interval(&self) -> Duration {
        match self.power.state() {
            PowerState::Low => self.config.low_power_interval(),
            PowerState::Normal | PowerState::Critical => self.config.decision_interval(),
        }
    }

    fn apply_completions(&mut self, now: Instant) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            let current_run = self.running.as_ref().and_then(|t| t.run);
            if current_run != Some(completion.run) {
                tracing::debug!(
                    run = %completion.run,
                    task_id = %completion.task,
                    "ignoring completion for a run that is no longer current"
                );
                continue;
            }
            let Some(mut task) = self.running.take() else {
                continue;
            };

            match completion.result {
                Ok(()) => {
                    task.complete(now);
                    tracing::info!(task_id = %task.id, kind = %task.kind, "task completed");
                    self.counts.completed += 1;
                    self.emit(SchedulerEvent::TaskCompleted { task: task.clone() });
                    self.history.push(task);
                }
                Err(error) => {
                    tracing::warn!(task_id = %task.id, kind = %task.kind, %error, "actuator reported failure");
                    self.fail_task(task, error.to_string(), now);
                }
            }
        }
    }

    fn enforce_critical_power(&mut self, now: Instant) {
        let min = self.config.critical_min_priority();

        if self.running.as_ref().is_some_and(|t| t.priority < min) {
            self.interrupt_running(now, true);
        }

        for task in self.queue.evict_below(min) {
            tracing::warn!(
                task_id = %task.id,
                priority = task.priority.get(),
                "evicting task on critical power"
            );
            self.counts.evicted += 1;
            self.fail_task(task, EVICTED_REASON, now);
        }
    }

    fn select(&mut self, now: Instant) {
        if self.running.is_none() {
            if let Some(task) = self.queue.pop_highest() {
                self.start(task, now);
            }
            return;
        }

        if self.should_preempt() {
            self.counts.preemptions += 1;
            self.interrupt_running(now, true);
            if let Some(task) = self.queue.pop_highest() {
                tracing::info!(task_id = %task.id, priority = task.priority.get(), "preempting");
                self.start(task, now);
            }
        }
    }

    fn should_preempt(&self) -> bool {
        let (Some(running), Some(next)) = (&self.running, self.queue.peek_highest()) else {
            return false;
        };
        next.priority.margin_over(running.priority) > i16::from(self.config.preemption_margin)
    }

    /// Fails the running task if it is past its limit. Returns whether it did.
    fn expire_overdue(&mut self, now: Instant) -> bool {
        let timeout = self.config.task_timeout();
        let overdue = self.running.as_ref().is_some_and(|t| {
            let limit = t.requested_duration.map_or(timeout, |d| d + timeout);
            t.running_for(now).is_some_and(|elapsed| elapsed > limit)
        });
        if !overdue {
            return false;
        }
        let Some(task) = self.running.take() else {
            return false;
        };

        if let Some(run) = task.run {
            self.actuator.stop(run);
        }
        tracing::warn!(task_id = %task.id, kind = %task.kind, "task timed out");
        self.counts.timed_out += 1;
        self.fail_task(task, TIMEOUT_REASON, now);
        true
    }

    fn reconcile_mode(&mut self, now: Instant) {
        if self.running.is_some() {
            return;
        }
        let resting = match self.power.state() {
            PowerState::Critical => Mode::Maintenance,
            PowerState::Normal | PowerState::Low => Mode::Idle,
        };
        self.set_mode(resting, now);
    }

    // ------------------------------------------------------------------
    // transitions
    // ------------------------------------------------------------------

    fn start(&mut self, mut task: Task, now: Instant) {
        let run = self.ids.generate_run_id();
        task.start(run, now);

        if let Some(mode) = self.config.modes.mode_for(task.kind) {
            self.set_mode(mode, now);
        }

        tracing::info!(
            task_id = %task.id,
            run = %run,
            kind = %task.kind,
            priority = task.priority.get(),
            "task started"
        );

        let command = ActuatorCommand {
            run,
            task: task.id,
            kind: task.kind,
            payload: task.payload.clone(),
            duration: task.requested_duration,
        };
        let reporter = CompletionReporter::new(run, task.id, self.completions_tx.clone());

        self.emit(SchedulerEvent::TaskStarted { task: task.clone() });
        self.running = Some(task);
        self.actuator.start(command, reporter);
    }

    /// Stop the running task.
    ///
    /// With `allow_resume`, a task of a resumable kind goes back to the
    /// front of its priority band instead of ending.
    fn interrupt_running(&mut self, now: Instant, allow_resume: bool) {
        let Some(mut task) = self.running.take() else {
            return;
        };

        if let Some(run) = task.run {
            self.actuator.stop(run);
        }
        task.interrupt(now);

        let requeued = allow_resume && self.config.resumable_kinds.contains(&task.kind);
        tracing::info!(task_id = %task.id, kind = %task.kind, requeued, "task interrupted");
        self.emit(SchedulerEvent::TaskInterrupted {
            task: task.clone(),
            requeued,
        });

        if requeued {
            task.resume();
            self.counts.requeued += 1;
            self.queue.insert_front(task);
        } else {
            self.counts.interrupted += 1;
            self.history.push(task);
        }
    }

    fn fail_task(&mut self, mut task: Task, reason: impl Into<String>, now: Instant) {
        task.fail(reason, now);
        self.counts.failed += 1;
        self.emit(SchedulerEvent::TaskFailed { task: task.clone() });
        self.history.push(task);
    }

    fn set_mode(&mut self, mode: Mode, now: Instant) {
        if let Some(ModeTransition { old, new }) = self.mode.transition_to(mode, now) {
            tracing::info!(%old, %new, "mode changed");
            self.emit(SchedulerEvent::ModeChanged { old, new });
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        self.bus.emit(&event);
    }

    // ------------------------------------------------------------------
    // shutdown
    // ------------------------------------------------------------------

    /// Interrupt the running task, fail everything pending and go Idle.
    pub fn shutdown(&mut self) {
        let now = self.clock.now();
        self.apply_completions(now);
        self.interrupt_running(now, false);

        let pending = self.queue.drain();
        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "failing pending tasks on shutdown");
        }
        for task in pending {
            self.fail_task(task, SHUTDOWN_REASON, now);
        }
        self.set_mode(Mode::Idle, now);
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.mode.mode()
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    pub fn power_level(&self) -> u8 {
        self.power.level()
    }

    pub fn running(&self) -> Option<&Task> {
        self.running.as_ref()
    }

    /// Pending tasks in service order.
    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn counts(&self) -> TaskCounts {
        self.counts
    }

    pub fn is_autonomous(&self) -> bool {
        self.autonomous
    }

    /// Finished tasks, most recent last.
    pub fn history(&self) -> Vec<Task> {
        self.history.snapshot()
    }

    pub fn status(&self) -> SchedulerStatus {
        let now = self.clock.now();
        SchedulerStatus {
            taken_at: self.clock.wall_clock(),
            mode: self.mode.mode(),
            running: self.running.as_ref().map(|t| TaskSummary {
                id: t.id,
                kind: t.kind,
                priority: t.priority,
                state: t.state,
                running_for_ms: t.running_for(now).map_or(0, millis),
            }),
            queue_len: self.queue.len(),
            power: self.power.state(),
            power_level: self.power.level(),
            autonomous: self.autonomous,
            tick_interval_ms: millis(self.tick_interval()),
            counts: self.counts,
            mode_time_ms: self
                .mode
                .time_in_modes(now)
                .into_iter()
                .map(|(mode, spent)| (mode, millis(spent)))
                .collect(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
