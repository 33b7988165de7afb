//! Scheduler configuration.
//!
//! Every field has a default, so an empty TOML file is a valid config.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ConfigError, ModeMap, PowerThresholds, Priority, TaskKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick period while power is Normal or Critical.
    pub decision_interval_ms: u64,
    /// Tick period while power is Low.
    pub low_power_interval_ms: u64,
    /// How long a task may run without the actuator reporting.
    pub task_timeout_ms: u64,
    /// A pending task preempts only if it beats the running one by more than this.
    pub preemption_margin: u8,
    /// While Critical, pending tasks below this priority are evicted.
    pub critical_min_priority: u8,
    pub history_limit: usize,
    pub resumable_kinds: HashSet<TaskKind>,
    pub modes: ModeMap,
    pub power: PowerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub low_threshold: u8,
    pub critical_threshold: u8,
    pub sample_interval_ms: u64,
    /// Submit a notification task when power turns Low or Critical.
    pub alerts: bool,
    pub low_alert_priority: u8,
    pub critical_alert_priority: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            decision_interval_ms: 1_000,
            low_power_interval_ms: 2_000,
            task_timeout_ms: 30_000,
            preemption_margin: 2,
            critical_min_priority: 9,
            history_limit: 200,
            resumable_kinds: HashSet::from([TaskKind::InputCapture]),
            modes: ModeMap::default(),
            power: PowerConfig::default(),
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        let thresholds = PowerThresholds::default();
        Self {
            low_threshold: thresholds.low,
            critical_threshold: thresholds.critical,
            sample_interval_ms: 30_000,
            alerts: true,
            low_alert_priority: 7,
            critical_alert_priority: 9,
        }
    }
}

impl SchedulerConfig {
    /// Load from a TOML file and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.decision_interval_ms == 0 || self.low_power_interval_ms == 0 {
            return invalid("tick intervals must be non-zero");
        }
        if self.power.sample_interval_ms == 0 {
            return invalid("power.sample_interval_ms must be non-zero");
        }
        if self.task_timeout_ms == 0 {
            return invalid("task_timeout_ms must be non-zero");
        }
        if self.history_limit == 0 {
            return invalid("history_limit must be at least 1");
        }
        if self.power.low_threshold > 100 || self.power.critical_threshold > 100 {
            return invalid("power thresholds must be within 0..=100");
        }
        if self.power.critical_threshold > self.power.low_threshold {
            return invalid("power.critical_threshold must not exceed power.low_threshold");
        }
        for (name, p) in [
            ("critical_min_priority", self.critical_min_priority),
            ("power.low_alert_priority", self.power.low_alert_priority),
            ("power.critical_alert_priority", self.power.critical_alert_priority),
        ] {
            if !(Priority::MIN.get()..=Priority::MAX.get()).contains(&p) {
                return Err(ConfigError::Invalid(format!("{name} must be within 1..=10")));
            }
        }
        Ok(())
    }

    pub fn decision_interval(&self) -> Duration {
        Duration::from_millis(self.decision_interval_ms)
    }

    pub fn low_power_interval(&self) -> Duration {
        Duration::from_millis(self.low_power_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn critical_min_priority(&self) -> Priority {
        Priority::clamped(self.critical_min_priority as i64)
    }

    pub fn thresholds(&self) -> PowerThresholds {
        PowerThresholds {
            low: self.power.low_threshold,
            critical: self.power.critical_threshold,
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl PowerConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Mode;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.decision_interval(), Duration::from_secs(1));
        assert_eq!(config.low_power_interval(), Duration::from_secs(2));
        assert_eq!(config.task_timeout(), Duration::from_secs(30));
        assert_eq!(config.preemption_margin, 2);
        assert_eq!(config.history_limit, 200);
        assert!(config.resumable_kinds.contains(&TaskKind::InputCapture));
        assert_eq!(config.resumable_kinds.len(), 1);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            task_timeout_ms = 5000
            preemption_margin = 1
            resumable_kinds = ["input-capture", "locomotion"]

            [modes]
            locomotion = "expression"

            [power]
            low_threshold = 30
            alerts = false
            "#,
        )
        .unwrap();

        assert_eq!(config.task_timeout(), Duration::from_secs(5));
        assert_eq!(config.preemption_margin, 1);
        assert!(config.resumable_kinds.contains(&TaskKind::Locomotion));
        assert_eq!(config.modes.mode_for(TaskKind::Locomotion), Some(Mode::Expression));
        assert_eq!(config.power.low_threshold, 30);
        assert_eq!(config.power.critical_threshold, 10);
        assert!(!config.power.alerts);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = SchedulerConfig::from_toml_str(
            r#"
            [power]
            low_threshold = 10
            critical_threshold = 20
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_priority() {
        let err = SchedulerConfig::from_toml_str("critical_min_priority = 12").unwrap_err();
        assert!(err.to_string().contains("critical_min_priority"));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = SchedulerConfig::from_toml_str(r#"resumable_kinds = ["dance"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn defaults_survive_toml_output() {
        let text = SchedulerConfig::default().to_toml_string().unwrap();
        let back = SchedulerConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, SchedulerConfig::default());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SchedulerConfig::load_from(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
