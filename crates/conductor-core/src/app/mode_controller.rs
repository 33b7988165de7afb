//! ModeController - tracks which mode the actuator is configured for.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::domain::Mode;

/// A mode change, returned so the caller can publish it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTransition {
    pub old: Mode,
    pub new: Mode,
}

/// Pure state holder. No transition is ever rejected.
///
/// Also accumulates time spent in each mode for the metrics view.
#[derive(Debug)]
pub struct ModeController {
    mode: Mode,
    since: Instant,
    time_in_mode: HashMap<Mode, Duration>,
}

impl ModeController {
    pub fn new(now: Instant) -> Self {
        Self {
            mode: Mode::Idle,
            since: now,
            time_in_mode: HashMap::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// No-op (returns `None`) when already in `mode`.
    pub fn transition_to(&mut self, mode: Mode, now: Instant) -> Option<ModeTransition> {
        if self.mode == mode {
            return None;
        }
        self.account(now);
        let old = std::mem::replace(&mut self.mode, mode);
        Some(ModeTransition { old, new: mode })
    }

    /// Time spent in each mode up to `now`, including the current stretch.
    pub fn time_in_modes(&self, now: Instant) -> HashMap<Mode, Duration> {
        let mut totals = self.time_in_mode.clone();
        *totals.entry(self.mode).or_default() += now.saturating_duration_since(self.since);
        totals
    }

    fn account(&mut self, now: Instant) {
        *self.time_in_mode.entry(self.mode).or_default() +=
            now.saturating_duration_since(self.since);
        self.since = now;
    }
}
