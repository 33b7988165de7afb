//! conductor-core
//!
//! Priority scheduler for a single exclusive actuator.
//!
//! Producers submit tasks; the scheduler decides on a fixed tick which one
//! holds the actuator, preempts on large priority gaps, enforces power-based
//! admission control, tracks the actuator's mode and publishes events.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, mode, power, state, events, errors）
//! - **ports**: 抽象化レイヤー（Actuator, Clock, IdGenerator, PowerSource）
//! - **queue**: 優先度キューと履歴
//! - **app**: スケジューラ本体（scheduler, runtime, builder, config, event_bus, ...）
//! - **impls**: 実装（SimulatedActuator / SimulatedBattery）
//!
//! # 使用例
//! ```ignore
//! let runtime = SchedulerBuilder::new(Arc::new(SimulatedActuator::new())).spawn()?;
//! let handle = runtime.handle();
//! let id = handle.submit(TaskRequest::new(TaskKind::Expression, 5));
//! let status = handle.status().await?;
//! runtime.shutdown_and_join().await;
//! ```

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{
    SchedulerBuilder, SchedulerConfig, SchedulerHandle, SchedulerRuntime, SchedulerStatus,
};
pub use domain::{Mode, PowerState, Priority, Task, TaskId, TaskKind, TaskRequest, TaskState};
