use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::instrument;

use super::{FrameSource, FrameStream, check_length, connect_error};
use crate::error::{Error, Result, error::InvalidUtf8Snafu};

/// Treats every websocket data message as one frame.
pub struct WebSocketSource {
    url: String,
    max_frame_length: usize,
}

impl WebSocketSource {
    pub fn new(url: impl Into<String>, max_frame_length: usize) -> WebSocketSource {
        WebSocketSource {
            url: url.into(),
            max_frame_length,
        }
    }
}

fn to_frame(message: Message, max_length: usize) -> Option<Result<String>> {
    match message {
        Message::Text(text) => Some(check_length(text, max_length)),
        Message::Binary(bytes) => Some(
            String::from_utf8(bytes)
                .map_err(|_| InvalidUtf8Snafu.build())
                .and_then(|text| check_length(text, max_length)),
        ),
        // Pongs are queued by tungstenite and flushed on the next read.
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) | Message::Close(_) => None,
    }
}

#[async_trait]
impl FrameSource for WebSocketSource {
    #[instrument(skip(self), fields(app.url = %self.url))]
    async fn connect(&self) -> Result<FrameStream> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| connect_error(&self.url, e))?;

        let max_length = self.max_frame_length;
        Ok(stream
            .filter_map(move |message| async move {
                match message {
                    Ok(message) => to_frame(message, max_length),
                    Err(e) => Some(Err(Error::from(e))),
                }
            })
            .boxed())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
