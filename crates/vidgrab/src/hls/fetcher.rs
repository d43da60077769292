// HLS Segment Fetcher: Handles the raw download of individual media segments with retry logic.

use crate::DownloadError;
use crate::hls::retry::{RetryAction, RetryPolicy, retry_with_backoff};
use crate::transport::{FetchRequest, HttpFetch, WHOLE_RESOURCE_RANGE};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};
use url::Url;

pub struct SegmentFetcher {
    transport: Arc<dyn HttpFetch>,
    /// Caller supplied headers (auth, cookies, referer), sent with every attempt
    headers: HeaderMap,
    /// Upper bound for a single attempt
    attempt_timeout: Option<Duration>,
}

impl SegmentFetcher {
    pub fn new(transport: Arc<dyn HttpFetch>) -> Self {
        Self {
            transport,
            headers: HeaderMap::new(),
            attempt_timeout: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Downloads one segment, retrying failed attempts with exponential backoff.
    ///
    /// Waits `retry_delay * 2^attempt` between attempts. Fails with
    /// [`DownloadError::RetryExhausted`] after `max_retries` retries, or with
    /// [`DownloadError::Cancelled`] as soon as `token` is cancelled.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        max_retries: u32,
        retry_delay: Duration,
        token: &CancellationToken,
    ) -> Result<Bytes, DownloadError> {
        // A relative or malformed URL fails every attempt the same way.
        if let Err(e) = Url::parse(url) {
            return Err(DownloadError::invalid_url(url, e.to_string()));
        }

        let policy = RetryPolicy::new(max_retries, retry_delay);
        let bytes: Bytes = retry_with_backoff(&policy, token, |attempt| async move {
            trace!(url, attempt, "Fetching segment");
            RetryAction::from(self.fetch_once(url, token).await)
        })
        .await?;

        debug!(url, size = bytes.len(), "Downloaded segment");
        Ok(bytes)
    }

    async fn fetch_once(
        &self,
        url: &str,
        token: &CancellationToken,
    ) -> Result<Bytes, DownloadError> {
        let request =
            FetchRequest::new(url, &self.headers, "segment").with_range(WHOLE_RESOURCE_RANGE);

        let attempt = async {
            match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, self.transport.get(request))
                    .await
                    .map_err(|_| DownloadError::Timeout {
                        reason: format!("segment {url} took longer than {limit:?}"),
                    })?,
                None => self.transport.get(request).await,
            }
        };

        let bytes = tokio::select! {
            _ = token.cancelled() => return Err(DownloadError::Cancelled),
            result = attempt => result?,
        };

        if bytes.is_empty() {
            return Err(DownloadError::empty_body(url, "segment"));
        }
        Ok(bytes)
    }
}
