use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::ReportError;
use crate::librato::{SnapshotBuilder, Submit};
use crate::registry::MetricsRegistry;

/// Periodic driver: one snapshot per interval, handed to a submitter.
pub struct Reporter<R: ?Sized> {
    builder: SnapshotBuilder,
    registry: Arc<R>,
    submitter: Arc<dyn Submit>,
    last_capture: Option<DateTime<Utc>>,
}

impl<R> Reporter<R>
where
    R: MetricsRegistry + Send + Sync + ?Sized,
{
    pub fn new(builder: SnapshotBuilder, registry: Arc<R>, submitter: Arc<dyn Submit>) -> Self {
        Self {
            builder,
            registry,
            submitter,
            last_capture: None,
        }
    }

    /// Build and submit a single batch captured at `now`.
    ///
    /// Returns the number of measurements submitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be built or the submitter fails.
    /// Either way the batch is dropped; nothing is retried.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<usize, ReportError> {
        let now = self.monotonic(now);
        let batch = self.builder.build(now, self.registry.as_ref())?;
        let measurements = batch.len();
        self.submitter.submit(batch).await?;
        Ok(measurements)
    }

    /// Tick every interval until `shutdown` fires. Per-tick failures are
    /// logged and the loop carries on.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.builder.options().interval;
        // First report one full interval after start
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = interval.as_secs_f64(),
            source = %self.builder.options().source,
            "reporter started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("reporter stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick(Utc::now()).await {
                        Ok(measurements) => tracing::debug!(measurements, "reported batch"),
                        Err(err) => tracing::error!(%err, "reporting tick failed"),
                    }
                }
            }
        }
    }

    /// Clamp capture times so consecutive batches never go backwards.
    fn monotonic(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = match self.last_capture {
            Some(last) if now < last => last,
            _ => now,
        };
        self.last_capture = Some(now);
        now
    }
}
