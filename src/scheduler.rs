use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::Aggregator;
use crate::config::SourceToggles;
use crate::error::StoreError;
use crate::feed::FeedWriter;

/// Runs an aggregation cycle on a fixed interval and publishes the result.
///
/// A slow cycle does not hold back the next tick; cycles may overlap, which
/// the caches and the last-good map are built to tolerate.
pub struct Scheduler {
    aggregator: Arc<Aggregator>,
    writer: Arc<FeedWriter>,
    toggles: SourceToggles,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        aggregator: Arc<Aggregator>,
        writer: Arc<FeedWriter>,
        toggles: SourceToggles,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            writer,
            toggles,
            interval,
        }
    }

    /// One cycle followed by a feed write. Returns the number of videos written.
    pub async fn run_once(&self) -> Result<usize, StoreError> {
        let videos = self.aggregator.run_cycle(&self.toggles).await;
        let count = videos.len();
        self.writer.write(videos).await?;
        Ok(count)
    }

    /// Ticks until `shutdown` is cancelled. The first cycle starts right away.
    /// Cycles still running at shutdown are aborted.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = JoinSet::new();

        info!(
            "⏰ Scheduler started, refreshing every {}",
            humantime::format_duration(self.interval)
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if !cycles.is_empty() {
                        debug!("{} cycle(s) still running, starting another", cycles.len());
                    }
                    let this = Arc::clone(&self);
                    cycles.spawn(async move { this.run_once().await });
                }
                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    match joined {
                        Ok(Ok(count)) => debug!("Cycle published {} videos", count),
                        Ok(Err(e)) => error!("❌ Cycle could not publish its feed: {}", e),
                        Err(e) => error!("❌ Cycle task failed: {}", e),
                    }
                }
            }
        }

        if !cycles.is_empty() {
            warn!("⚠️ Aborting {} running cycle(s)", cycles.len());
        }
        cycles.shutdown().await;
        info!("⏹️ Scheduler stopped");
    }
}
