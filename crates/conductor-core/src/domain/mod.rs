//! Domain model (ids, tasks, modes, power, events, errors).
//!
//! Plain data only. Nothing in here knows about clocks, channels or the
//! actuator.

pub mod errors;
pub mod events;
pub mod ids;
pub mod mode;
pub mod power;
pub mod state;
pub mod task;

pub use errors::{
    ActuatorError, ConfigError, ListenerError, PowerSourceError, SchedulerError,
};
pub use events::{EventName, SchedulerEvent};
pub use ids::{RunId, TaskId};
pub use mode::{Mode, ModeMap};
pub use power::{PowerState, PowerThresholds, level_from_voltage};
pub use state::TaskState;
pub use task::{Priority, Task, TaskKind, TaskRequest, UnknownTaskKind};
