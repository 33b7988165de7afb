//! EventBus - synchronous fan-out of scheduler events.
//!
//! Listeners run inline on the scheduling loop, so they must be fast and must
//! not block. A listener that errors or panics is reported and skipped; the
//! remaining listeners still run and the tick carries on.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::domain::{EventName, ListenerError, SchedulerEvent};

/// Receives events for the names it was subscribed to.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &SchedulerEvent) -> Result<(), ListenerError>;
}

impl<F> Listener for F
where
    F: Fn(&SchedulerEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, event: &SchedulerEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(u64);

/// A listener invocation that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub event: EventName,
    pub subscription: SubscriptionId,
    pub message: String,
}

struct Subscription {
    id: SubscriptionId,
    listener: Arc<dyn Listener>,
    errors: Option<mpsc::UnboundedSender<ListenerFailure>>,
}

#[derive(Default)]
pub struct EventBus {
    subscriptions: HashMap<EventName, Vec<Subscription>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `name`.
    ///
    /// Failures of this listener are forwarded to `errors` when given.
    pub fn subscribe(
        &mut self,
        name: EventName,
        listener: Arc<dyn Listener>,
        errors: Option<mpsc::UnboundedSender<ListenerFailure>>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.entry(name).or_default().push(Subscription {
            id,
            listener,
            errors,
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for subs in self.subscriptions.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
        }
        removed
    }

    #[cfg(test)]
    pub fn listener_count(&self, name: EventName) -> usize {
        self.subscriptions.get(&name).map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener subscribed to its name, in
    /// subscription order.
    pub fn emit(&self, event: &SchedulerEvent) {
        let name = event.name();
        let Some(subs) = self.subscriptions.get(&name) else {
            return;
        };

        for sub in subs {
            let outcome = catch_unwind(AssertUnwindSafe(|| sub.listener.on_event(event)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.message,
                Err(panic) => panic_message(panic.as_ref()),
            };

            tracing::warn!(event = %name, subscription = sub.id.0, error = %message, "listener failed");
            if let Some(errors) = &sub.errors {
                // subscriber may have stopped listening for failures
                let _ = errors.send(ListenerFailure {
                    event: name,
                    subscription: sub.id,
                    message,
                });
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("listener panicked: {s}")
    } else {
        "listener panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::{Mode, PowerState};

    fn mode_event() -> SchedulerEvent {
        SchedulerEvent::ModeChanged {
            old: Mode::Idle,
            new: Mode::Expression,
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<EventName>>>, Arc<dyn Listener>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = move |e: &SchedulerEvent| -> Result<(), ListenerError> {
            sink.lock().unwrap().push(e.name());
            Ok(())
        };
        (seen, Arc::new(listener))
    }

    #[test]
    fn delivers_only_to_matching_name() {
        let mut bus = EventBus::new();
        let (modes, l1) = recorder();
        let (power, l2) = recorder();
        bus.subscribe(EventName::ModeChanged, l1, None);
        bus.subscribe(EventName::PowerStateChanged, l2, None);

        bus.emit(&mode_event());

        assert_eq!(*modes.lock().unwrap(), vec![EventName::ModeChanged]);
        assert!(power.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_listener_does_not_stop_the_others() {
        let mut bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let erroring =
            |_: &SchedulerEvent| -> Result<(), ListenerError> { Err(ListenerError::new("disk full")) };
        let panicking = |_: &SchedulerEvent| -> Result<(), ListenerError> { panic!("boom") };
        let (seen, healthy) = recorder();

        let bad = bus.subscribe(EventName::ModeChanged, Arc::new(erroring), Some(tx.clone()));
        let worse = bus.subscribe(EventName::ModeChanged, Arc::new(panicking), Some(tx));
        bus.subscribe(EventName::ModeChanged, healthy, None);

        bus.emit(&mode_event());

        assert_eq!(seen.lock().unwrap().len(), 1);

        let f1 = rx.try_recv().unwrap();
        assert_eq!(f1.subscription, bad);
        assert_eq!(f1.message, "disk full");
        assert_eq!(f1.event, EventName::ModeChanged);

        let f2 = rx.try_recv().unwrap();
        assert_eq!(f2.subscription, worse);
        assert!(f2.message.contains("boom"));
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let mut bus = EventBus::new();
        let (seen, l) = recorder();
        let id = bus.subscribe(EventName::PowerStateChanged, l, None);
        assert_eq!(bus.listener_count(EventName::PowerStateChanged), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.emit(&SchedulerEvent::PowerStateChanged {
            old: PowerState::Normal,
            new: PowerState::Low,
            level: 19,
        });
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn emit_without_listeners_is_fine() {
        EventBus::new().emit(&mode_event());
    }
}
