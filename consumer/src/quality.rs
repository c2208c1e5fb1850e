use std::{sync::Arc, time::Duration};

use ais_core::{Metrics, PositionInbound, QualityMetric};
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Periodically closes the metrics interval, logs it as a data quality report and persists it.
pub struct QualityReporter {
    store: Arc<dyn PositionInbound>,
    metrics: Arc<Metrics>,
    interval: Duration,
}

impl QualityReporter {
    pub fn new(
        store: Arc<dyn PositionInbound>,
        metrics: Arc<Metrics>,
        interval: Duration,
    ) -> QualityReporter {
        QualityReporter {
            store,
            metrics,
            interval,
        }
    }

    /// Reports every interval until `token` is cancelled, then reports the final partial
    /// interval.
    #[instrument(skip_all)]
    pub async fn run(self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.report().await;
                }
            }
        }

        self.report().await;
    }

    pub async fn report(&self) -> QualityMetric {
        let metric = self.metrics.take_quality_metric(Utc::now());

        info!(
            app.accepted = metric.accepted,
            app.rejected = metric.rejected,
            app.duplicate = metric.duplicate,
            app.late_dropped = metric.late_dropped,
            "data quality {} to {}: {} frames, {:.2}% valid",
            metric.interval_start,
            metric.interval_end,
            metric.total(),
            metric.valid_percentage(),
        );

        if let Err(e) = self.store.add_quality_metric(&metric).await {
            error!(
                "failed to persist data quality metric: {}",
                snafu::Report::from_error(e)
            );
        }

        metric
    }
}
