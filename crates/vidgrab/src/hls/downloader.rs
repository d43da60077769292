// Video Downloader: Entry point tying resolution, playlist fetching and segment
// download together.

use crate::DownloadError;
use crate::config::DownloaderConfig;
use crate::hls::coordinator::{DownloadCoordinator, DownloadOptions, DownloadResult};
use crate::hls::estimate::{EstimateConfig, estimate_download_size};
use crate::hls::fetcher::SegmentFetcher;
use crate::hls::resolver::{PlaylistResolver, SourceKind, VideoSource};
use crate::transport::{HttpFetch, HttpTransport};
use hls::VariantSelector;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct VideoDownloader {
    transport: Arc<dyn HttpFetch>,
    resolver: PlaylistResolver,
    segment_timeout: Option<Duration>,
    estimate_config: EstimateConfig,
}

impl VideoDownloader {
    /// Builds a downloader backed by a reqwest client created from `config`.
    pub fn new(
        config: &DownloaderConfig,
        selector: VariantSelector,
    ) -> Result<Self, DownloadError> {
        let transport: Arc<dyn HttpFetch> = Arc::new(HttpTransport::from_config(config)?);
        let downloader = Self::with_transport(transport, selector);
        Ok(downloader.with_segment_timeout(config.segment_timeout))
    }

    pub fn with_transport(transport: Arc<dyn HttpFetch>, selector: VariantSelector) -> Self {
        Self {
            resolver: PlaylistResolver::new(Arc::clone(&transport), selector),
            transport,
            segment_timeout: None,
            estimate_config: EstimateConfig::default(),
        }
    }

    pub fn with_segment_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.segment_timeout = timeout;
        self
    }

    pub fn with_estimate_config(mut self, config: EstimateConfig) -> Self {
        self.estimate_config = config;
        self
    }

    pub fn resolver(&self) -> &PlaylistResolver {
        &self.resolver
    }

    /// Downloads the video behind `url` into memory.
    ///
    /// `headers` are sent verbatim with every request. Progress observers
    /// and the cancellation token travel in `options`.
    #[instrument(skip(self, headers, options))]
    pub async fn download(
        &self,
        url: &str,
        headers: &HeaderMap,
        options: DownloadOptions,
    ) -> Result<DownloadResult, DownloadError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DownloadError::invalid_input("video URL is empty"));
        }
        if options.token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let source = self.resolve_source(url, headers).await?;
        info!(
            source = %source.url,
            kind = ?source.kind,
            quality = source.quality.as_deref().unwrap_or("unknown"),
            "Resolved video source"
        );

        match source.kind {
            SourceKind::Direct => self.download_direct(&source.url, headers, &options).await,
            SourceKind::M3u8 => self.download_hls(&source.url, headers, options).await,
            SourceKind::Dash | SourceKind::Blob => {
                Err(DownloadError::Unsupported { url: source.url })
            }
        }
    }

    /// Estimates how many bytes [`download`](Self::download) would fetch.
    /// Direct sources are sized with a single HEAD request.
    pub async fn estimate_size(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<u64, DownloadError> {
        let source = self.resolve_source(url.trim(), headers).await?;
        let config = &self.estimate_config;
        match source.kind {
            SourceKind::Direct => {
                let length = self.transport.content_length(&source.url, headers).await?;
                Ok(length.unwrap_or(config.fallback_segment_size))
            }
            _ => {
                let playlist = self.resolver.fetch_playlist(&source.url, headers).await?;
                let transport = self.transport.as_ref();
                let segments = playlist.segments();
                let estimate = estimate_download_size(transport, segments, headers, config).await;
                Ok(estimate)
            }
        }
    }

    async fn resolve_source(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<VideoSource, DownloadError> {
        self.resolver
            .resolve(url, headers)
            .await
            .ok_or_else(|| DownloadError::Unsupported {
                url: url.to_string(),
            })
    }

    fn segment_fetcher(&self, headers: &HeaderMap) -> SegmentFetcher {
        SegmentFetcher::new(Arc::clone(&self.transport))
            .with_headers(headers.clone())
            .with_attempt_timeout(self.segment_timeout)
    }

    async fn download_direct(
        &self,
        url: &str,
        headers: &HeaderMap,
        options: &DownloadOptions,
    ) -> Result<DownloadResult, DownloadError> {
        let data = self
            .segment_fetcher(headers)
            .fetch_with_retry(
                url,
                options.max_retries,
                options.retry_delay,
                &options.token,
            )
            .await?;
        Ok(DownloadResult::new(data, 0.0))
    }

    async fn download_hls(
        &self,
        url: &str,
        headers: &HeaderMap,
        options: DownloadOptions,
    ) -> Result<DownloadResult, DownloadError> {
        let playlist = self.resolver.fetch_playlist(url, headers).await?;
        if playlist.is_live() {
            warn!(
                url,
                segments = playlist.segments().len(),
                "Live playlist, downloading the current window only"
            );
        }

        let coordinator = DownloadCoordinator::new(Arc::new(self.segment_fetcher(headers)));
        coordinator
            .download_segments(playlist.segments(), options)
            .await
    }
}
