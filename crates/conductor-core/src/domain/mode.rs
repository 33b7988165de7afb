//! Operating mode of the actuator and the kind -> mode mapping.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::task::TaskKind;

/// What the actuator is currently configured to do.
///
/// Descriptive only: every mode is reachable from every other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Idle,
    Expression,
    InputCapture,
    Hybrid,
    Maintenance,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Idle,
        Mode::Expression,
        Mode::InputCapture,
        Mode::Hybrid,
        Mode::Maintenance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Expression => "expression",
            Mode::InputCapture => "input-capture",
            Mode::Hybrid => "hybrid",
            Mode::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Injectable mapping from task kind to the mode its task runs in.
///
/// A kind without an entry leaves the mode unchanged when its task starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeMap(HashMap<TaskKind, Mode>);

impl ModeMap {
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn with(mut self, kind: TaskKind, mode: Mode) -> Self {
        self.0.insert(kind, mode);
        self
    }

    pub fn mode_for(&self, kind: TaskKind) -> Option<Mode> {
        self.0.get(&kind).copied()
    }
}

impl Default for ModeMap {
    fn default() -> Self {
        Self::empty()
            .with(TaskKind::Expression, Mode::Expression)
            .with(TaskKind::InputCapture, Mode::InputCapture)
            .with(TaskKind::Locomotion, Mode::Hybrid)
            .with(TaskKind::Notification, Mode::Expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_covers_every_kind() {
        let map = ModeMap::default();
        for kind in TaskKind::ALL {
            assert!(map.mode_for(kind).is_some(), "{kind} has no mode");
        }
        assert_eq!(map.mode_for(TaskKind::InputCapture), Some(Mode::InputCapture));
    }

    #[test]
    fn custom_map_can_leave_kinds_unmapped() {
        let map = ModeMap::empty().with(TaskKind::Expression, Mode::Hybrid);
        assert_eq!(map.mode_for(TaskKind::Expression), Some(Mode::Hybrid));
        assert_eq!(map.mode_for(TaskKind::Notification), None);
    }

    #[test]
    fn map_reads_from_toml_table() {
        #[derive(Deserialize)]
        struct Wrapper {
            modes: ModeMap,
        }
        let w: Wrapper = toml::from_str(
            r#"
            [modes]
            expression = "hybrid"
            input-capture = "input-capture"
            "#,
        )
        .unwrap();
        assert_eq!(w.modes.mode_for(TaskKind::Expression), Some(Mode::Hybrid));
        assert_eq!(w.modes.mode_for(TaskKind::Locomotion), None);
    }
}
