use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Url};
use tokio_util::{codec::FramedRead, compat::FuturesAsyncReadCompatExt};
use tracing::instrument;

use super::{FrameCodec, FrameSource, FrameStream, connect_error, flatten_frame};
use crate::error::{Result, error::FailedRequestSnafu};

/// Reads newline delimited frames from a long lived http response body.
pub struct HttpLineSource {
    client: Client,
    url: Url,
    max_frame_length: usize,
}

impl HttpLineSource {
    pub fn new(url: &str, max_frame_length: usize) -> Result<HttpLineSource> {
        let parsed = Url::parse(url).map_err(|e| connect_error(url, e))?;

        Ok(HttpLineSource {
            client: Client::builder().build()?,
            url: parsed,
            max_frame_length,
        })
    }
}

#[async_trait]
impl FrameSource for HttpLineSource {
    #[instrument(skip(self), fields(app.url = %self.url))]
    async fn connect(&self) -> Result<FrameStream> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| connect_error(self.url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return FailedRequestSnafu {
                url: self.url.as_str(),
                status,
                body: response.text().await?,
            }
            .fail();
        }

        let reader = response
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other))
            .into_async_read()
            .compat();

        Ok(FramedRead::new(reader, FrameCodec::new(self.max_frame_length))
            .map(flatten_frame)
            .boxed())
    }

    fn endpoint(&self) -> &str {
        self.url.as_str()
    }
}
