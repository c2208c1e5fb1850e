use std::{fmt, sync::Arc, time::Duration};

use ais_core::{Metrics, RawFrame};
use async_channel::Sender;
use backon::{BackoffBuilder, ExponentialBackoff};
use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::Error,
    retry::{backoff, sleep_or_cancel},
    settings::SourceSettings,
    source::{FrameSource, FrameStream},
};

/// Keeps a connection to the frame source open and forwards every frame in arrival order.
///
/// Connection failures are retried forever with exponential backoff, the backoff restarts from
/// `min_delay` once a connection has been established.
pub struct Ingestor {
    source: Arc<dyn FrameSource>,
    settings: SourceSettings,
    metrics: Arc<Metrics>,
}

enum Disconnect {
    Cancelled,
    ReceiverClosed,
    EndOfStream,
    Silent(Duration),
    Failed(Error),
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disconnect::Cancelled => f.write_str("shutdown requested"),
            Disconnect::ReceiverClosed => f.write_str("validator queue closed"),
            Disconnect::EndOfStream => f.write_str("source closed the stream"),
            Disconnect::Silent(d) => write!(f, "no frames for {d:?}"),
            Disconnect::Failed(e) => write!(f, "{}", snafu::Report::from_error(e)),
        }
    }
}

impl Ingestor {
    pub fn new(
        source: Arc<dyn FrameSource>,
        settings: SourceSettings,
        metrics: Arc<Metrics>,
    ) -> Ingestor {
        Ingestor {
            source,
            settings,
            metrics,
        }
    }

    fn delays(&self) -> ExponentialBackoff {
        backoff(
            self.settings.backoff.min_delay,
            self.settings.backoff.max_delay,
            usize::MAX,
        )
        .build()
    }

    /// Runs until `token` is cancelled or the validator queue closes. Dropping `sender` on
    /// return is what lets the downstream stages drain and stop.
    #[instrument(skip_all, fields(app.endpoint = self.source.endpoint()))]
    pub async fn run(self, sender: Sender<RawFrame>, token: CancellationToken) {
        let mut delays = self.delays();

        loop {
            let connected = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                r = tokio::time::timeout(self.settings.connect_timeout, self.source.connect()) => r,
            };

            match connected {
                Ok(Ok(stream)) => {
                    self.metrics.connection_established();
                    info!("connected to frame source");
                    delays = self.delays();

                    let disconnect = self.forward(stream, &sender, &token).await;
                    self.metrics.connection_lost();

                    match disconnect {
                        Disconnect::Cancelled | Disconnect::ReceiverClosed => {
                            info!("stopped reading frames: {disconnect}");
                            break;
                        }
                        Disconnect::EndOfStream | Disconnect::Silent(_) | Disconnect::Failed(_) => {
                            warn!("lost connection to frame source: {disconnect}");
                        }
                    }
                }
                Ok(Err(e)) => {
                    self.metrics.connect_failed();
                    warn!("failed to connect to frame source: {}", snafu::Report::from_error(&e));
                }
                Err(_) => {
                    self.metrics.connect_failed();
                    warn!(
                        "connecting to frame source timed out after {:?}",
                        self.settings.connect_timeout
                    );
                }
            }

            let delay = delays.next().unwrap_or(self.settings.backoff.max_delay);
            debug!("reconnecting in {delay:?}");
            if !sleep_or_cancel(delay, &token).await {
                break;
            }
        }
    }

    async fn forward(
        &self,
        mut stream: FrameStream,
        sender: &Sender<RawFrame>,
        token: &CancellationToken,
    ) -> Disconnect {
        let read_timeout = self.settings.read_timeout;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Disconnect::Cancelled,
                next = tokio::time::timeout(read_timeout, stream.next()) => next,
            };

            let frame = match next {
                Err(_) => return Disconnect::Silent(read_timeout),
                Ok(None) => return Disconnect::EndOfStream,
                Ok(Some(Err(e))) if e.is_framing() => {
                    self.metrics.framing_error();
                    warn!("dropped frame: {e}");
                    continue;
                }
                Ok(Some(Err(e))) => return Disconnect::Failed(e),
                Ok(Some(Ok(frame))) => frame,
            };

            if frame.trim().is_empty() {
                continue;
            }

            self.metrics.frame_received();
            let raw = RawFrame::new(frame, Utc::now());

            tokio::select! {
                biased;
                _ = token.cancelled() => return Disconnect::Cancelled,
                sent = sender.send(raw) => {
                    if sent.is_err() {
                        return Disconnect::ReceiverClosed;
                    }
                }
            }
        }
    }
}
