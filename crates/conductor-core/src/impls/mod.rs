//! Impls - 実装（開発用・デモ用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **SimulatedActuator**: tokio task 上で sleep して完了する Actuator
//! - **SimulatedBattery**: サンプルごとに電圧が下がる PowerSource
//!
//! # 本番用実装
//! 実機の Actuator / PowerSource（シリアル、BLE など）は別クレートに配置し、
//! 再接続やバックオフはその中で完結させます。

pub mod simulated;

// 主要な型を再エクスポート
pub use self::simulated::{SimulatedActuator, SimulatedBattery};
