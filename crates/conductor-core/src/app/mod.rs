//! App - アプリケーション層
//!
//! ports を組み合わせてスケジューリングのロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Scheduler**: tick ごとの判断（admission / selection / timeout / mode）
//! - **SchedulerRuntime / SchedulerHandle**: tokio 上の実行ループと外部 API
//! - **SchedulerBuilder**: 構築とワイヤリング（Fail-fast）
//! - **PowerMonitor / ModeController / EventBus**: Scheduler が所有する部品
//! - **PowerLoop**: PowerSource のポーリング

pub mod builder;
pub mod config;
pub mod event_bus;
pub mod mode_controller;
mod power_loop;
pub mod power_monitor;
pub mod runtime;
pub mod scheduler;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::config::{PowerConfig, SchedulerConfig};
pub use self::event_bus::{EventBus, Listener, ListenerFailure, SubscriptionId};
pub use self::mode_controller::{ModeController, ModeTransition};
pub use self::power_monitor::{PowerMonitor, PowerTransition};
pub use self::runtime::{SchedulerHandle, SchedulerRuntime};
pub use self::scheduler::{EVICTED_REASON, SHUTDOWN_REASON, Scheduler, TIMEOUT_REASON};
pub use self::status::{SchedulerStatus, TaskCounts, TaskSummary};
