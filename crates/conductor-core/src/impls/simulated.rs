//! Simulated adapters - 開発用の Actuator / PowerSource
//!
//! # 学習ポイント
//! - `start` は即座に返し、実際の「動作」は tokio task 上で行う
//! - `stop` は `AbortHandle` で task を止める（reporter は drop され、
//!   scheduler 側では古い run の完了として無視される）
//! - 共有状態は std の `Mutex` で保護（await を跨いでロックしない）

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::AbortHandle;

use crate::domain::{ActuatorError, PowerSourceError, RunId, TaskKind, level_from_voltage};
use crate::ports::{Actuator, ActuatorCommand, CompletionReporter, PowerSource};

/// SimulatedActuator は各 run を一定時間 sleep してから完了させる
///
/// # 実装詳細
/// - run 時間は `requested_duration`、なければ kind ごとのデフォルト
/// - `failing()` で指定した kind は時間経過後に `ActuatorError::Device` で失敗
/// - 実行中の run は `RunId -> AbortHandle` で管理
pub struct SimulatedActuator {
    durations: HashMap<TaskKind, Duration>,
    failures: HashMap<TaskKind, String>,
    active: Arc<Mutex<HashMap<RunId, AbortHandle>>>,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        let durations = HashMap::from([
            (TaskKind::Expression, Duration::from_secs(2)),
            (TaskKind::InputCapture, Duration::from_secs(10)),
            (TaskKind::Locomotion, Duration::from_secs(5)),
            (TaskKind::Notification, Duration::from_secs(1)),
        ]);
        Self {
            durations,
            failures: HashMap::new(),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Default run time for `kind` when the task requests none.
    pub fn with_duration(mut self, kind: TaskKind, duration: Duration) -> Self {
        self.durations.insert(kind, duration);
        self
    }

    /// Every run of `kind` fails with `message`.
    pub fn failing(mut self, kind: TaskKind, message: impl Into<String>) -> Self {
        self.failures.insert(kind, message.into());
        self
    }

    /// Runs started and neither finished nor stopped.
    pub fn active_runs(&self) -> usize {
        self.active.lock().map(|a| a.len()).unwrap_or(0)
    }
}

impl Default for SimulatedActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl Actuator for SimulatedActuator {
    fn start(&self, command: ActuatorCommand, done: CompletionReporter) {
        let run = command.run;
        let duration = command
            .duration
            .or_else(|| self.durations.get(&command.kind).copied())
            .unwrap_or(Duration::from_secs(1));
        let failure = self.failures.get(&command.kind).cloned();
        let active = Arc::clone(&self.active);

        tracing::debug!(%run, kind = %command.kind, ?duration, payload = %command.payload, "actuator run");

        // ロックは spawn 前に取る: 即座に終わる task が自分の entry を消す前に登録する
        let Ok(mut runs) = self.active.lock() else {
            done.fail(ActuatorError::Rejected("actuator state poisoned".into()));
            return;
        };
        let join = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Ok(mut runs) = active.lock() {
                runs.remove(&run);
            }
            match failure {
                Some(message) => done.fail(ActuatorError::Device(message)),
                None => done.complete(),
            }
        });
        runs.insert(run, join.abort_handle());
    }

    fn stop(&self, run: RunId) {
        let handle = self.active.lock().ok().and_then(|mut runs| runs.remove(&run));
        if let Some(handle) = handle {
            tracing::debug!(%run, "actuator stop");
            handle.abort();
        }
    }
}

/// SimulatedBattery はサンプルごとに電圧を `drain` だけ下げる
///
/// Level is derived with `level_from_voltage`, so 4.2 V reads 100 and 3.6 V
/// reads 0.
pub struct SimulatedBattery {
    volts: Mutex<f32>,
    drain: f32,
}

impl SimulatedBattery {
    pub fn new(volts: f32, drain: f32) -> Self {
        Self {
            volts: Mutex::new(volts),
            drain,
        }
    }

    #[cfg(test)]
    pub fn set_volts(&self, volts: f32) {
        if let Ok(mut v) = self.volts.lock() {
            *v = volts;
        }
    }

    pub fn volts(&self) -> f32 {
        self.volts.lock().map(|v| *v).unwrap_or(f32::NAN)
    }
}

#[async_trait]
impl PowerSource for SimulatedBattery {
    async fn sample_level(&self) -> Result<u8, PowerSourceError> {
        let mut volts = self
            .volts
            .lock()
            .map_err(|_| PowerSourceError::Unavailable("battery state poisoned".into()))?;
        let reading = *volts;
        if !reading.is_finite() || reading < 0.0 {
            return Err(PowerSourceError::OutOfRange(reading));
        }
        *volts = (reading - self.drain).max(0.0);
        Ok(level_from_voltage(reading))
    }
}
