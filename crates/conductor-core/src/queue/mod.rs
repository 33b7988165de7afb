//! Queue module: pending-task ordering and finished-task history.

mod history;
mod memory;

pub use history::TaskHistory;
pub use memory::TaskQueue;
