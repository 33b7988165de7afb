//! Ports - 抽象化レイヤー
//!
//! Scheduler が外部に依存する能力（時刻、ID、アクチュエータ、電源）を trait として定義します。
//! 実装は注入され、テストでは差し替えます。

pub mod actuator;
pub mod clock;
pub mod id_generator;
pub mod power_source;

pub use self::actuator::{Actuator, ActuatorCommand, Completion, CompletionReporter};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::power_source::PowerSource;
