//! PowerMonitor - classifies power samples and detects transitions.
//!
//! Measurement only. What to do about a transition is the scheduler's call.

use crate::domain::{PowerState, PowerThresholds};

/// Edge-triggered classification change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTransition {
    pub old: PowerState,
    pub new: PowerState,
    pub level: u8,
}

#[derive(Debug)]
pub struct PowerMonitor {
    thresholds: PowerThresholds,
    level: u8,
    state: PowerState,
}

impl PowerMonitor {
    /// Assumes a full level until the first sample arrives.
    pub fn new(thresholds: PowerThresholds) -> Self {
        Self {
            thresholds,
            level: 100,
            state: thresholds.classify(100),
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Record a sample. Returns a transition only when the class changed.
    pub fn record(&mut self, level: u8) -> Option<PowerTransition> {
        let level = level.min(100);
        self.level = level;
        let new = self.thresholds.classify(level);
        if new == self.state {
            return None;
        }
        let old = std::mem::replace(&mut self.state, new);
        Some(PowerTransition { old, new, level })
    }
}
