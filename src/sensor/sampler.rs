//! Sampler task
//!
//! Polls an [`AccelSource`] at a fixed interval and feeds the tracker.
//! Read failures are logged and counted; the loop only ends on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::source::AccelSource;
use super::tracker::OrientationTracker;
use crate::logger;
use crate::server::ShutdownListener;

/// Counters reported when the sampler stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SamplerStats {
    pub samples: u64,
    pub errors: u64,
}

pub async fn run(
    tracker: Arc<OrientationTracker>,
    mut source: Box<dyn AccelSource>,
    interval: Duration,
    mut shutdown: ShutdownListener,
) -> SamplerStats {
    let mut stats = SamplerStats::default();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    logger::log_sampler_started(source.name(), interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = source.read().and_then(|sample| tracker.ingest_accel(sample));
                match result {
                    Ok(change) => {
                        stats.samples += 1;
                        if let Some(change) = change {
                            logger::log_alert(&change);
                        }
                    }
                    Err(e) => {
                        stats.errors += 1;
                        logger::log_sensor_error(source.name(), &e);
                    }
                }
            }
            () = shutdown.wait() => break,
        }
    }

    logger::log_sampler_stopped(stats.samples, stats.errors);
    stats
}
