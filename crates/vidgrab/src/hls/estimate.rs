// Download size estimation from a handful of HEAD requests.

use crate::transport::HttpFetch;
use hls::Segment;
use humansize::{BINARY, format_size};
use reqwest::header::HeaderMap;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct EstimateConfig {
    /// Number of leading segments sampled with HEAD
    pub sample_size: usize,
    /// Assumed size of a segment when no HEAD response reports a length
    pub fallback_segment_size: u64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            sample_size: 3,
            fallback_segment_size: 500 * 1024,
        }
    }
}

/// Estimates the total byte size of `segments`.
///
/// Sends HEAD for the first `sample_size` segments and extrapolates the average
/// reported `Content-Length`. Requests that fail or carry no length are ignored.
pub async fn estimate_download_size(
    transport: &dyn HttpFetch,
    segments: &[Segment],
    headers: &HeaderMap,
    config: &EstimateConfig,
) -> u64 {
    if segments.is_empty() {
        return 0;
    }

    let mut sampled = 0u128;
    let mut total = 0u128;
    for segment in segments.iter().take(config.sample_size) {
        match transport.content_length(&segment.url, headers).await {
            Ok(Some(length)) => {
                sampled += 1;
                total += u128::from(length);
            }
            Ok(None) => debug!(url = %segment.url, "No Content-Length in HEAD response"),
            Err(e) => debug!(url = %segment.url, error = %e, "Size check failed"),
        }
    }

    let count = segments.len() as u64;
    // Clamped to u64::MAX rather than overflowing on absurd Content-Length values.
    let estimate = if sampled == 0 {
        count.saturating_mul(config.fallback_segment_size)
    } else {
        u64::try_from(total * u128::from(count) / sampled).unwrap_or(u64::MAX)
    };
    debug!(
        segments = count,
        sampled,
        estimate = %format_size(estimate, BINARY),
        "Estimated download size"
    );
    estimate
}
