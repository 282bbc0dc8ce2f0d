//! HTTP GET returning the response body as an async byte stream

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

/// Build the shared client used for every download of a hub
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| Error::config(format!("failed to create HTTP client: {}", e), None))
}

/// Send a GET for `url` and return its body as an [`AsyncRead`]
///
/// Sending the request races `cancel`. Non-success statuses are errors; the
/// body is not consumed here. Transport errors raised while the body is read
/// surface as `std::io::Error` from the reader.
pub async fn open_body(
    client: &reqwest::Client,
    url: &str,
    cancel: &CancellationToken,
) -> Result<impl AsyncRead + Unpin + Send + use<>> {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        response = client.get(url).send() => response.map_err(|e| Error::network(url, e))?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    tracing::debug!(
        url,
        content_length = response.content_length(),
        "Response headers received"
    );

    let body = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
    Ok(StreamReader::new(body))
}
