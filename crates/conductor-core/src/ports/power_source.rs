//! PowerSource port - where power levels come from.

use async_trait::async_trait;

use crate::domain::PowerSourceError;

/// Something that can report a 0-100 power level.
///
/// Polled by the power sampler on its own interval, never by the tick loop.
#[async_trait]
pub trait PowerSource: Send + Sync {
    async fn sample_level(&self) -> Result<u8, PowerSourceError>;
}
