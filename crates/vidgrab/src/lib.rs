//! # Vidgrab Engine
//!
//! In-memory video download engine for HLS playlists and direct media files.
//!
//! ## Features
//!
//! - Playlist resolution with quality-based variant selection
//! - Bounded concurrent segment downloads with retry and exponential backoff
//! - Cooperative cancellation and progress reporting
//!
//! ## Component Overview
//!
//! - `hls`: resolver, segment fetcher, download coordinator and the `VideoDownloader` facade
//! - `transport`: the `HttpFetch` seam and its reqwest implementation
//! - `config`: HTTP client configuration

pub mod config;
pub mod error;
pub mod hls;
pub mod logging;
pub mod transport;

#[cfg(test)]
mod test_utils;

pub use config::{DownloaderConfig, create_client};
pub use error::DownloadError;
pub use hls::{
    DownloadCoordinator, DownloadOptions, DownloadProgress, DownloadResult, EstimateConfig,
    PlaylistResolver, ProgressObserver, SegmentFetcher, SourceKind, VideoDownloader, VideoSource,
};
pub use transport::{HttpFetch, HttpTransport};
