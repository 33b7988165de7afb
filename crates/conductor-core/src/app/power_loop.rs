//! PowerLoop - polls the `PowerSource` and forwards samples to the scheduler.
//!
//! # フロー
//! 1. `sample_interval` ごとに `PowerSource::sample_level()` を呼ぶ
//! 2. 成功したら `Command::PowerLevel` を scheduler に送る
//! 3. 失敗したらログを出してそのサンプルは捨てる（分類は変わらない）

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};

use super::runtime::Command;
use crate::ports::PowerSource;

pub(crate) async fn power_sampler_loop(
    source: Arc<dyn PowerSource>,
    every: Duration,
    tx: mpsc::UnboundedSender<Command>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // first tick fires immediately: the level is known right after startup
    let mut interval = time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = interval.tick() => {
                match source.sample_level().await {
                    Ok(level) => {
                        if tx.send(Command::PowerLevel(level)).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "power sample failed; keeping previous classification");
                    }
                }
            }
        }
    }
}
