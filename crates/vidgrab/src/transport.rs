// HTTP transport seam: everything that touches the network goes through `HttpFetch`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, RANGE};
use tracing::trace;

use crate::DownloadError;
use crate::config::{DownloaderConfig, create_client};

/// Range header value requesting the whole resource.
pub const WHOLE_RESOURCE_RANGE: &str = "bytes=0-";

/// A single GET request issued by the engine.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    /// Caller supplied headers, forwarded verbatim
    pub headers: &'a HeaderMap,
    pub range: Option<&'a str>,
    /// Short label used in errors and logs ("segment", "playlist", ...)
    pub operation: &'static str,
}

impl<'a> FetchRequest<'a> {
    pub fn new(url: &'a str, headers: &'a HeaderMap, operation: &'static str) -> Self {
        Self {
            url,
            headers,
            range: None,
            operation,
        }
    }

    pub fn with_range(mut self, range: &'a str) -> Self {
        self.range = Some(range);
        self
    }
}

#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Fetch the full body. Non-success statuses are returned as
    /// [`DownloadError::HttpStatus`].
    async fn get(&self, request: FetchRequest<'_>) -> Result<Bytes, DownloadError>;

    /// Issue a HEAD request and report the declared `Content-Length`, if any.
    async fn content_length(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Option<u64>, DownloadError>;
}

/// `HttpFetch` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        Ok(Self::new(create_client(config)?))
    }
}

#[async_trait]
impl HttpFetch for HttpTransport {
    async fn get(&self, request: FetchRequest<'_>) -> Result<Bytes, DownloadError> {
        let mut builder = self
            .client
            .get(request.url)
            .headers(request.headers.clone());
        if let Some(range) = request.range {
            builder = builder.header(RANGE, range);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(
                status,
                request.url,
                request.operation,
            ));
        }

        trace!(
            url = %request.url,
            http_version = ?response.version(),
            operation = request.operation,
            "Response received"
        );
        Ok(response.bytes().await?)
    }

    async fn content_length(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Option<u64>, DownloadError> {
        let response = self.client.head(url).headers(headers.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(status, url, "size check"));
        }

        // Read the header directly: the body size hint of a HEAD response is zero.
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok()))
    }
}
