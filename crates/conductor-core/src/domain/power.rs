//! Power classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a 0-100 power level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Normal,
    Low,
    Critical,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerState::Normal => "normal",
            PowerState::Low => "low",
            PowerState::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Inclusive thresholds: `level <= critical` is Critical, `level <= low` is Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerThresholds {
    pub low: u8,
    pub critical: u8,
}

impl PowerThresholds {
    pub fn classify(&self, level: u8) -> PowerState {
        if level <= self.critical {
            PowerState::Critical
        } else if level <= self.low {
            PowerState::Low
        } else {
            PowerState::Normal
        }
    }
}

impl Default for PowerThresholds {
    fn default() -> Self {
        Self {
            low: 20,
            critical: 10,
        }
    }
}

/// Cell voltage at which the level reads 0.
pub const EMPTY_VOLTS: f32 = 3.6;
/// Cell voltage at which the level reads 100.
pub const FULL_VOLTS: f32 = 4.2;

/// Linear voltage -> level conversion, clamped into 0..=100.
pub fn level_from_voltage(volts: f32) -> u8 {
    if !volts.is_finite() {
        return 0;
    }
    let ratio = (volts - EMPTY_VOLTS) / (FULL_VOLTS - EMPTY_VOLTS);
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}
