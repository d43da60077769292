// HLS Playlist Resolver: Turns a page-supplied URL into a downloadable video source.

use crate::DownloadError;
use crate::transport::{FetchRequest, HttpFetch};
use hls::{Playlist, VariantSelector};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Container extensions that can be fetched as a single file.
const DIRECT_EXTENSIONS: &[&str] = &[
    "mp4", "webm", "mkv", "mov", "m4v", "avi", "flv", "ogg", "ogv",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Direct,
    M3u8,
    Dash,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSource {
    pub url: String,
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl VideoSource {
    fn new(url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            url: url.into(),
            kind,
            quality: None,
        }
    }
}

/// Classifies a URL by its shape alone.
pub fn detect_kind(url: &str) -> Option<SourceKind> {
    let lowered = url.trim().to_ascii_lowercase();
    if lowered.starts_with("blob:") {
        return Some(SourceKind::Blob);
    }
    if has_direct_extension(&lowered) {
        return Some(SourceKind::Direct);
    }
    if lowered.contains(".m3u8") {
        return Some(SourceKind::M3u8);
    }
    if lowered.contains(".mpd") {
        return Some(SourceKind::Dash);
    }
    None
}

fn has_direct_extension(url: &str) -> bool {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_owned(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_owned(),
    };
    let file_name = path.rsplit('/').next().unwrap_or_default();
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| DIRECT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

pub struct PlaylistResolver {
    transport: Arc<dyn HttpFetch>,
    selector: VariantSelector,
}

impl PlaylistResolver {
    pub fn new(transport: Arc<dyn HttpFetch>, selector: VariantSelector) -> Self {
        Self {
            transport,
            selector,
        }
    }

    /// Resolves `url` to something the engine can download.
    ///
    /// Returns `None` for unsupported URLs and for any fetch failure along
    /// the way; failures are logged rather than returned.
    #[instrument(skip(self, headers), level = "debug")]
    pub async fn resolve(&self, url: &str, headers: &HeaderMap) -> Option<VideoSource> {
        match detect_kind(url) {
            Some(SourceKind::Direct) => {
                debug!(url, "Direct media URL");
                Some(VideoSource::new(url, SourceKind::Direct))
            }
            Some(SourceKind::M3u8) => match self.resolve_hls(url, headers).await {
                Ok(source) => Some(source),
                Err(e) => {
                    warn!(url, error = %e, "Failed to resolve HLS playlist");
                    None
                }
            },
            Some(SourceKind::Dash) => {
                info!(url, "DASH manifests are not supported");
                None
            }
            Some(SourceKind::Blob) => {
                info!(url, "blob: URLs cannot be fetched outside their page");
                None
            }
            None => {
                debug!(url, "No recognizable video source");
                None
            }
        }
    }

    async fn resolve_hls(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<VideoSource, DownloadError> {
        let playlist = self.fetch_playlist(url, headers).await?;
        if !playlist.is_master {
            return Ok(VideoSource::new(url, SourceKind::M3u8));
        }

        let Some(variant) = self.selector.select(&playlist.variants) else {
            debug!(url, "Master playlist has no selectable variant");
            return Ok(VideoSource::new(url, SourceKind::M3u8));
        };

        let variant_url = hls::resolve_url(&variant.url, url);
        debug!(
            variant_url,
            bandwidth = variant.bandwidth,
            resolution = ?variant.resolution,
            "Selected variant"
        );

        // Confirms the media playlist is reachable; its contents are fetched
        // again at download time.
        self.fetch_playlist(&variant_url, headers).await?;

        Ok(VideoSource {
            url: variant_url,
            kind: SourceKind::M3u8,
            quality: variant.quality_label().map(str::to_owned),
        })
    }

    /// Fetches `url` and parses it with `url` as the base for relative references.
    pub async fn fetch_playlist(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Playlist, DownloadError> {
        let body = self
            .transport
            .get(FetchRequest::new(url, headers, "playlist"))
            .await?;
        let text = String::from_utf8_lossy(&body);
        let playlist = hls::parse(&text, Some(url));
        debug!(
            url,
            is_master = playlist.is_master,
            variants = playlist.variants.len(),
            segments = playlist.segments().len(),
            "Parsed playlist"
        );
        Ok(playlist)
    }
}
