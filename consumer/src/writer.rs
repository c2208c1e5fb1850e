use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use ais_core::{Metrics, PositionInbound, PositionReport};
use async_channel::Receiver;
use backon::Retryable;
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::{
    dead_letter::{DeadLetter, DeadLetterQueue},
    models::IngestedReport,
    retry::{backoff, sleep_or_cancel},
    settings::WriterSettings,
};

/// Batches released reports into idempotent bulk inserts.
///
/// A batch is flushed once it holds `batch_size` reports or `flush_interval` has passed since
/// the last flush. Transient store errors are retried up to `max_attempts` in total, after which
/// the batch is dead-lettered and the writer moves on.
pub struct BatchWriter {
    store: Arc<dyn PositionInbound>,
    settings: WriterSettings,
    dead_letters: DeadLetterQueue,
    metrics: Arc<Metrics>,
}

impl BatchWriter {
    pub fn new(
        store: Arc<dyn PositionInbound>,
        settings: WriterSettings,
        dead_letters: DeadLetterQueue,
        metrics: Arc<Metrics>,
    ) -> BatchWriter {
        BatchWriter {
            store,
            settings,
            dead_letters,
            metrics,
        }
    }

    /// Runs until the released report queue is closed and drained, the final partial batch is
    /// flushed before returning. Cancelling `token` only cuts retries short.
    #[instrument(skip_all)]
    pub async fn run(self, receiver: Receiver<IngestedReport>, token: CancellationToken) {
        let mut batch = Vec::with_capacity(self.settings.batch_size);
        let mut interval = tokio::time::interval(self.settings.flush_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                report = receiver.recv() => match report {
                    Ok(report) => {
                        batch.push(report);
                        if batch.len() >= self.settings.batch_size {
                            self.flush(&mut batch, &token).await;
                            interval.reset();
                        }
                    }
                    Err(_) => break,
                },
                _ = interval.tick() => {
                    if !batch.is_empty() {
                        self.flush(&mut batch, &token).await;
                    }
                }
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &token).await;
        }
    }

    #[instrument(skip_all, fields(app.batch_size = batch.len()))]
    async fn flush(&self, batch: &mut Vec<IngestedReport>, token: &CancellationToken) {
        let reports = batch
            .iter()
            .map(|r| r.report.clone())
            .collect::<Vec<PositionReport>>();
        let attempts = AtomicUsize::new(0);
        let store_timeout = self.settings.store_timeout;
        let (store, to_insert, tries) = (&self.store, &reports, &attempts);

        let sleep_token = token.clone();
        let result = (|| async move {
            tries.fetch_add(1, Ordering::Relaxed);
            match tokio::time::timeout(store_timeout, store.add_positions(to_insert)).await {
                Ok(result) => result,
                Err(elapsed) => Err(ais_core::Error::unavailable(elapsed)),
            }
        })
        .retry(backoff(
            self.settings.retry_min_delay,
            self.settings.retry_max_delay,
            self.settings.max_attempts.saturating_sub(1),
        ))
        .sleep(move |delay: Duration| {
            let token = sleep_token.clone();
            async move {
                sleep_or_cancel(delay, &token).await;
            }
        })
        .when(|e| e.is_transient() && !token.is_cancelled())
        .notify(|e, delay| {
            warn!(
                "failed to persist batch, retrying in {delay:?}: {}",
                snafu::Report::from_error(e)
            )
        })
        .await;

        match result {
            Ok(outcome) => {
                self.metrics.batch_persisted(outcome.inserted, outcome.ignored);
                let now = Utc::now();
                for r in batch.iter() {
                    self.metrics
                        .observe_latency((now - r.received_at).to_std().unwrap_or_default());
                }
                debug!(
                    "persisted batch, {} new and {} already stored",
                    outcome.inserted, outcome.ignored
                );
            }
            Err(e) => {
                let attempts = attempts.load(Ordering::Relaxed);
                let report = snafu::Report::from_error(&e).to_string();
                error!(
                    "dead-lettering batch of {} reports after {attempts} attempts: {report}",
                    reports.len()
                );
                self.metrics.flush_failed();
                self.metrics.batch_dead_lettered(reports.len());
                self.dead_letters
                    .push(DeadLetter {
                        failed_at: Utc::now(),
                        attempts,
                        error: report,
                        reports,
                    })
                    .await;
            }
        }

        batch.clear();
    }
}
