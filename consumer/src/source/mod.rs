use ais_core::BoxedError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use snafu::IntoError;
use tokio_util::{
    bytes::BytesMut,
    codec::{Decoder, LinesCodec, LinesCodecError},
};

use crate::error::{
    Error, Result,
    error::{ConnectSnafu, FrameTooLongSnafu, InvalidUtf8Snafu},
};

mod http;
mod websocket;

pub use http::HttpLineSource;
pub use websocket::WebSocketSource;

/// Frames of a single connection in arrival order.
///
/// Framing errors ([`Error::is_framing`]) are yielded as items and leave the connection usable,
/// any other error ends the connection.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// A push based source of raw frames.
#[async_trait]
pub trait FrameSource: Send + Sync + 'static {
    async fn connect(&self) -> Result<FrameStream>;
    /// Where the frames come from, used in logs.
    fn endpoint(&self) -> &str;
}

/// Newline delimited framing which reports oversized and non utf-8 lines as items instead of
/// terminating the stream.
#[derive(Debug)]
pub struct FrameCodec {
    lines: LinesCodec,
    max_length: usize,
}

impl FrameCodec {
    pub fn new(max_length: usize) -> FrameCodec {
        FrameCodec {
            lines: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    fn translate(
        &self,
        decoded: std::result::Result<Option<String>, LinesCodecError>,
    ) -> std::io::Result<Option<Result<String>>> {
        match decoded {
            Ok(line) => Ok(line.map(Ok)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(
                FrameTooLongSnafu {
                    max_length: self.max_length,
                }
                .fail(),
            )),
            Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                Ok(Some(InvalidUtf8Snafu.fail()))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Result<String>;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::io::Result<Option<Self::Item>> {
        let decoded = self.lines.decode(src);
        self.translate(decoded)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> std::io::Result<Option<Self::Item>> {
        let decoded = self.lines.decode_eof(src);
        self.translate(decoded)
    }
}

pub(crate) fn flatten_frame(frame: std::io::Result<Result<String>>) -> Result<String> {
    match frame {
        Ok(frame) => frame,
        Err(e) => Err(Error::from(e)),
    }
}

pub(crate) fn check_length(frame: String, max_length: usize) -> Result<String> {
    if frame.len() > max_length {
        FrameTooLongSnafu { max_length }.fail()
    } else {
        Ok(frame)
    }
}

pub(crate) fn connect_error(url: &str, error: impl Into<BoxedError>) -> Error {
    ConnectSnafu { url }.into_error(error.into())
}
