// HLS download pipeline: resolve the source, fetch segments, reassemble

mod coordinator;
mod downloader;
mod estimate;
mod events;
mod fetcher;
mod resolver;
mod retry;

// Re-exports for easier access
pub use coordinator::{
    DownloadCoordinator, DownloadOptions, DownloadResult, VIDEO_MIME_TYPE, concatenate,
};
pub use downloader::VideoDownloader;
pub use estimate::{EstimateConfig, estimate_download_size};
pub use events::{DownloadProgress, FnObserver, ProgressObserver};
pub use fetcher::SegmentFetcher;
pub use resolver::{PlaylistResolver, SourceKind, VideoSource, detect_kind};
pub use retry::{RetryAction, RetryPolicy, retry_with_backoff};
