//! SchedulerBuilder - 構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 不正な config は tick が回る前に弾く

use std::sync::Arc;

use super::config::SchedulerConfig;
use super::runtime::SchedulerRuntime;
use super::scheduler::Scheduler;
use crate::domain::ConfigError;
use crate::ports::{Actuator, Clock, IdGenerator, PowerSource, SystemClock, UlidGenerator};

/// SchedulerBuilder は Scheduler / SchedulerRuntime を構築
///
/// # 使用例
/// ```ignore
/// let runtime = SchedulerBuilder::new(Arc::new(SimulatedActuator::new()))
///     .config(SchedulerConfig::load_from(path)?)
///     .power_source(Arc::new(SimulatedBattery::new(4.1, 0.01)))
///     .spawn()?;
/// let handle = runtime.handle();
/// ```
///
/// # デフォルト
/// - clock: `SystemClock`
/// - id_generator: `UlidGenerator` (同じ clock を使う)
/// - power_source: なし（`SchedulerHandle::report_power_level` で手動投入）
pub struct SchedulerBuilder {
    actuator: Arc<dyn Actuator>,
    config: SchedulerConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    power_source: Option<Arc<dyn PowerSource>>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("scheduler config rejected: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl SchedulerBuilder {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self {
            actuator,
            config: SchedulerConfig::default(),
            clock: None,
            ids: None,
            power_source: None,
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Only used by `spawn`; `build` returns the bare core.
    pub fn power_source(mut self, source: Arc<dyn PowerSource>) -> Self {
        self.power_source = Some(source);
        self
    }

    /// 同期コアだけを構築（テストや独自ループ用）
    ///
    /// # 検証
    /// - `SchedulerConfig::validate()` が失敗すれば `BuildError::InvalidConfig`
    pub fn build(self) -> Result<Scheduler, BuildError> {
        self.into_parts().map(|(scheduler, _)| scheduler)
    }

    /// 構築して tokio 上で起動
    pub fn spawn(self) -> Result<SchedulerRuntime, BuildError> {
        let (scheduler, power_source) = self.into_parts()?;
        Ok(SchedulerRuntime::spawn(scheduler, power_source))
    }

    fn into_parts(self) -> Result<(Scheduler, Option<Arc<dyn PowerSource>>), BuildError> {
        self.config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids = self.ids.unwrap_or_else(|| {
            Arc::new(UlidGenerator::new(Arc::clone(&clock))) as Arc<dyn IdGenerator>
        });

        let scheduler = Scheduler::new(self.config, self.actuator, clock, ids);
        Ok((scheduler, self.power_source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Mode, RunId, TaskKind, TaskRequest};
    use crate::ports::{ActuatorCommand, CompletionReporter, FixedClock};

    struct NullActuator;

    impl Actuator for NullActuator {
        fn start(&self, _command: ActuatorCommand, _done: CompletionReporter) {}
        fn stop(&self, _run: RunId) {}
    }

    #[test]
    fn test_build_with_defaults() {
        let scheduler = SchedulerBuilder::new(Arc::new(NullActuator)).build().unwrap();
        assert_eq!(scheduler.mode(), Mode::Idle);
        assert_eq!(scheduler.config(), &SchedulerConfig::default());
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = SchedulerConfig::default();
        config.decision_interval_ms = 0;
        let result = SchedulerBuilder::new(Arc::new(NullActuator))
            .config(config)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::InvalidConfig(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_build_uses_injected_clock() {
        let clock = FixedClock::default();
        let mut scheduler = SchedulerBuilder::new(Arc::new(NullActuator))
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        scheduler.submit(TaskRequest::new(TaskKind::Expression, 5));
        scheduler.tick();
        clock.advance(std::time::Duration::from_millis(1_500));

        let status = scheduler.status();
        assert_eq!(status.running.map(|r| r.running_for_ms), Some(1_500));
    }
}
