use std::{path::PathBuf, sync::Arc};

use ais_core::{Metrics, PositionInbound, PositionOutbound, QueryEngine};
use memory_store::MemoryAdapter;
use postgres::PostgresAdapter;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::{
    dead_letter::DeadLetterQueue,
    error::{Result, error::InvalidSettingSnafu},
    ingestor::Ingestor,
    ordering::Orderer,
    quality::QualityReporter,
    settings::{Environment, Settings, StoreKind, Transport},
    source::{FrameSource, HttpLineSource, WebSocketSource},
    validator::Validator,
    writer::BatchWriter,
};

/// The assembled pipeline: ingestor, validator, ordering buffer and batch writer connected by
/// bounded queues, plus the quality reporter.
pub struct App {
    settings: Settings,
    source: Arc<dyn FrameSource>,
    inbound: Arc<dyn PositionInbound>,
    outbound: Arc<dyn PositionOutbound>,
    metrics: Arc<Metrics>,
    dead_letters: DeadLetterQueue,
    token: CancellationToken,
}

impl App {
    /// Connects to the configured store and frame source, an unreachable store is fatal.
    pub async fn build(settings: &Settings) -> Result<App> {
        let (inbound, outbound): (Arc<dyn PositionInbound>, Arc<dyn PositionOutbound>) =
            match settings.store.kind {
                StoreKind::Postgres => {
                    let Some(psql) = settings.store.postgres.as_ref() else {
                        return InvalidSettingSnafu {
                            setting: "store.postgres",
                            reason: "required when store.kind is postgres",
                        }
                        .fail();
                    };
                    let adapter = PostgresAdapter::new(psql).await?;
                    if settings.environment == Environment::Local {
                        adapter.do_migrations().await?;
                    }
                    (Arc::new(adapter.clone()), Arc::new(adapter))
                }
                StoreKind::Memory => {
                    let adapter = MemoryAdapter::new();
                    (Arc::new(adapter.clone()), Arc::new(adapter))
                }
            };

        let source: Arc<dyn FrameSource> = match settings.source.transport {
            Transport::Http => Arc::new(HttpLineSource::new(
                &settings.source.url,
                settings.source.max_frame_length,
            )?),
            Transport::WebSocket => Arc::new(WebSocketSource::new(
                settings.source.url.clone(),
                settings.source.max_frame_length,
            )),
        };

        Ok(App::from_parts(settings, source, inbound, outbound))
    }

    /// Assembles the pipeline from already constructed parts.
    pub fn from_parts(
        settings: &Settings,
        source: Arc<dyn FrameSource>,
        inbound: Arc<dyn PositionInbound>,
        outbound: Arc<dyn PositionOutbound>,
    ) -> App {
        App {
            dead_letters: DeadLetterQueue::new(
                settings.writer.dead_letter_capacity,
                settings.writer.dead_letter_path.as_ref().map(PathBuf::from),
            ),
            settings: settings.clone(),
            source,
            inbound,
            outbound,
            metrics: Arc::new(Metrics::new()),
            token: CancellationToken::new(),
        }
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Read side of the store, usable while the pipeline is running.
    pub fn query_engine(&self) -> QueryEngine {
        QueryEngine::new(self.outbound.clone())
    }

    pub fn dead_letters(&self) -> DeadLetterQueue {
        self.dead_letters.clone()
    }

    /// Cancelling the token shuts the pipeline down gracefully: the ingestor stops, every
    /// queued report is drained through the remaining stages and the final batch is written.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    #[instrument(skip_all)]
    pub async fn run(self) -> Result<()> {
        // Must finish before the writer starts appending to the same file.
        if let Err(e) = self.dead_letters.replay(self.inbound.as_ref()).await {
            error!(
                "failed to replay dead letters: {}",
                snafu::Report::from_error(e)
            );
        }

        let capacity = self.settings.channel_capacity;
        let (frame_tx, frame_rx) = async_channel::bounded(capacity);
        let (valid_tx, valid_rx) = async_channel::bounded(capacity);
        let (released_tx, released_rx) = async_channel::bounded(capacity);

        let ingestor = Ingestor::new(
            self.source.clone(),
            self.settings.source.clone(),
            self.metrics.clone(),
        );
        let validator = Validator::new(
            self.settings.validation.max_clock_skew,
            self.metrics.clone(),
        );
        let orderer = Orderer::new(&self.settings.ordering, self.metrics.clone());
        let writer = BatchWriter::new(
            self.inbound.clone(),
            self.settings.writer.clone(),
            self.dead_letters.clone(),
            self.metrics.clone(),
        );

        // The reporter outlives the pipeline so its final report covers the drained reports.
        let reporter_token = CancellationToken::new();
        let reporter = tokio::spawn(
            QualityReporter::new(
                self.inbound.clone(),
                self.metrics.clone(),
                self.settings.quality_report_interval,
            )
            .run(reporter_token.clone()),
        );

        let mut set = JoinSet::new();
        set.spawn(ingestor.run(frame_tx, self.token.clone()));
        set.spawn(validator.run(frame_rx, valid_tx));
        set.spawn(orderer.run(valid_rx, released_tx));
        set.spawn(writer.run(released_rx, self.token.clone()));

        info!("pipeline started");

        let mut outcome = Ok(());
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!("pipeline stage failed: {e:?}");
                // A dead stage would leave the others blocked on its queue.
                self.token.cancel();
                set.abort_all();
                if outcome.is_ok() {
                    outcome = Err(e.into());
                }
            }
        }

        reporter_token.cancel();
        if let Err(e) = reporter.await {
            error!("quality reporter failed: {e:?}");
        }

        info!("pipeline stopped");
        outcome
    }
}
