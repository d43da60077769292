// HLS Download Coordinator: Drives a bounded window of segment fetches and
// reassembles the finished segments in playlist order.

use crate::DownloadError;
use crate::hls::events::{DownloadProgress, FnObserver, ProgressObserver, notify_observers};
use crate::hls::fetcher::SegmentFetcher;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use hls::Segment;
use humansize::{BINARY, format_size};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Mime type reported for every assembled asset.
pub const VIDEO_MIME_TYPE: &str = "video/mp4";

#[derive(Clone)]
pub struct DownloadOptions {
    /// Retries per segment after the first attempt
    pub max_retries: u32,
    /// Base backoff delay, doubled after every failed attempt
    pub retry_delay: Duration,
    /// Upper bound on simultaneously running segment fetches
    pub max_concurrent: usize,
    pub observers: Vec<Arc<dyn ProgressObserver>>,
    pub token: CancellationToken,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            max_concurrent: 5,
            observers: Vec::new(),
            token: CancellationToken::new(),
        }
    }
}

impl fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("max_concurrent", &self.max_concurrent)
            .field("observers", &self.observers.len())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl DownloadOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn on_progress<F>(self, callback: F) -> Self
    where
        F: Fn(&DownloadProgress) + Send + Sync + 'static,
    {
        self.with_observer(Arc::new(FnObserver(callback)))
    }

    pub fn with_progress_channel(self, tx: mpsc::UnboundedSender<DownloadProgress>) -> Self {
        self.with_observer(Arc::new(tx))
    }
}

/// The assembled binary asset.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    pub data: Bytes,
    pub mime_type: &'static str,
    pub size: u64,
    /// Sum of the durations of every requested segment, in seconds
    pub duration: f64,
}

impl DownloadResult {
    pub fn new(data: Bytes, duration: f64) -> Self {
        Self {
            size: data.len() as u64,
            data,
            mime_type: VIDEO_MIME_TYPE,
            duration,
        }
    }
}

struct ProgressTracker {
    total: usize,
    completed: usize,
    bytes: u64,
    started: Instant,
}

impl ProgressTracker {
    fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            bytes: 0,
            started: Instant::now(),
        }
    }

    fn record(&mut self, size: usize) -> DownloadProgress {
        self.completed += 1;
        self.bytes += size as u64;

        let elapsed = self.started.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            self.bytes as f64 / elapsed
        } else {
            0.0
        };
        let remaining = self.total.saturating_sub(self.completed) as f64;
        let average = self.bytes as f64 / self.completed as f64;
        let eta = if speed > 0.0 {
            remaining * average / speed
        } else {
            0.0
        };

        DownloadProgress {
            current_segment: self.completed,
            total_segments: self.total,
            percentage: (self.completed as f64 / self.total as f64 * 100.0).round() as u32,
            bytes_downloaded: self.bytes,
            speed,
            eta,
        }
    }
}

pub struct DownloadCoordinator {
    fetcher: Arc<SegmentFetcher>,
}

impl DownloadCoordinator {
    pub fn new(fetcher: Arc<SegmentFetcher>) -> Self {
        Self { fetcher }
    }

    /// Downloads every segment and concatenates them by ascending `index`.
    ///
    /// At most `max_concurrent` fetches run at once (0 is treated as 1).
    /// Segments are admitted in the order given; completion order is free.
    /// The first segment that exhausts its retries aborts the whole download,
    /// and cancellation returns [`DownloadError::Cancelled`] with no partial
    /// result. Segment URLs must be absolute; a relative one is rejected as
    /// [`DownloadError::InvalidInput`] before any request is made.
    #[instrument(skip_all, fields(segments = segments.len()))]
    pub async fn download_segments(
        &self,
        segments: &[Segment],
        options: DownloadOptions,
    ) -> Result<DownloadResult, DownloadError> {
        if segments.is_empty() {
            return Err(DownloadError::invalid_input("no segments to download"));
        }
        if let Some(segment) = segments.iter().find(|s| Url::parse(&s.url).is_err()) {
            let Segment { index, url, .. } = segment;
            let reason = format!("segment {index} has no absolute URL: {url}");
            return Err(DownloadError::invalid_input(reason));
        }

        let token = &options.token;
        let max_concurrent = options.max_concurrent.max(1);
        let total = segments.len();
        info!(total, max_concurrent, "Starting segment download");

        let mut queue: VecDeque<&Segment> = segments.iter().collect();
        let mut in_flight = FuturesUnordered::new();
        let mut parts: BTreeMap<usize, Bytes> = BTreeMap::new();
        let mut progress = ProgressTracker::new(total);

        loop {
            if token.is_cancelled() {
                info!(completed = parts.len(), total, "Segment download cancelled");
                return Err(DownloadError::Cancelled);
            }

            while in_flight.len() < max_concurrent {
                let Some(segment) = queue.pop_front() else {
                    break;
                };
                debug!(index = segment.index, url = %segment.url, "Admitting segment");
                in_flight.push(self.fetch_segment(segment, &options));
            }

            if in_flight.is_empty() {
                break;
            }

            let (index, result) = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!(completed = parts.len(), total, "Segment download cancelled");
                    return Err(DownloadError::Cancelled);
                }
                Some(done) = in_flight.next() => done,
            };

            let bytes = match result {
                Ok(bytes) => bytes,
                Err(e) => {
                    if !e.is_cancelled() {
                        error!(index, error = %e, "Segment failed, aborting download");
                    }
                    return Err(e);
                }
            };

            let update = progress.record(bytes.len());
            parts.insert(index, bytes);
            debug!(
                index,
                completed = update.current_segment,
                total,
                percentage = update.percentage,
                "Segment complete"
            );
            notify_observers(&options.observers, &update);
        }

        let mut ordered: Vec<&Segment> = segments.iter().collect();
        ordered.sort_by_key(|segment| segment.index);
        let chunks: Vec<Option<Bytes>> = ordered
            .iter()
            .map(|segment| parts.remove(&segment.index))
            .collect();

        let data = concatenate(&chunks)?;
        let duration = segments.iter().map(|segment| segment.duration).sum();
        info!(
            size = %format_size(data.len() as u64, BINARY),
            duration,
            "Segment download complete"
        );
        Ok(DownloadResult::new(data, duration))
    }

    async fn fetch_segment(
        &self,
        segment: &Segment,
        options: &DownloadOptions,
    ) -> (usize, Result<Bytes, DownloadError>) {
        let result = self
            .fetcher
            .fetch_with_retry(
                &segment.url,
                options.max_retries,
                options.retry_delay,
                &options.token,
            )
            .await;
        (segment.index, result)
    }
}

/// Joins chunks in slice order, skipping (and logging) missing entries.
pub fn concatenate(chunks: &[Option<Bytes>]) -> Result<Bytes, DownloadError> {
    if chunks.is_empty() {
        return Err(DownloadError::invalid_input("nothing to concatenate"));
    }

    let capacity = chunks.iter().flatten().map(Bytes::len).sum();
    let mut joined = BytesMut::with_capacity(capacity);
    for (position, chunk) in chunks.iter().enumerate() {
        match chunk {
            Some(bytes) => joined.extend_from_slice(bytes),
            None => warn!(position, "Missing segment data, skipping"),
        }
    }
    Ok(joined.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeResponse, FakeTransport, init_tracing};
    use reqwest::StatusCode;
    use std::sync::Mutex;

    fn segment(index: usize, duration: f64) -> Segment {
        Segment {
            url: format!("https://cdn.example.com/v/seg{index}.ts"),
            duration,
            index,
            discontinuity: None,
            title: None,
        }
    }

    fn coordinator(transport: &Arc<FakeTransport>) -> DownloadCoordinator {
        DownloadCoordinator::new(Arc::new(SegmentFetcher::new(transport.clone())))
    }

    fn fast_options() -> DownloadOptions {
        DownloadOptions::default().with_retry_delay(Duration::from_millis(10))
    }

    fn delayed(body: impl Into<Bytes>, millis: u64) -> Vec<FakeResponse> {
        let delay = Duration::from_millis(millis);
        vec![FakeResponse::body(body).after(delay)]
    }

    #[tokio::test(start_paused = true)]
    async fn assembles_in_index_order_regardless_of_completion_order() {
        init_tracing();
        let segments = vec![segment(0, 10.0), segment(1, 10.0), segment(2, 5.5)];
        // Later segments finish first.
        let transport = Arc::new(
            FakeTransport::new()
                .route(&segments[0].url, delayed("AAA", 300))
                .route(&segments[1].url, delayed("BB", 200))
                .route(&segments[2].url, delayed("C", 100)),
        );

        let result = coordinator(&transport)
            .download_segments(&segments, fast_options())
            .await
            .unwrap();

        assert_eq!(result.data.as_ref(), b"AAABBC");
        assert_eq!(result.size, 6);
        assert_eq!(result.duration, 25.5);
        assert_eq!(result.mime_type, "video/mp4");
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_max_concurrent() {
        let segments: Vec<Segment> = (0..10).map(|i| segment(i, 2.0)).collect();
        let mut transport = FakeTransport::new();
        for s in &segments {
            transport = transport.route(&s.url, delayed("x", 50));
        }
        let transport = Arc::new(transport);

        let result = coordinator(&transport)
            .download_segments(&segments, fast_options().with_max_concurrent(3))
            .await
            .unwrap();

        assert_eq!(result.data.len(), 10);
        assert_eq!(transport.max_in_flight(), 3);
        assert_eq!(transport.call_count(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_concurrency_is_clamped_to_one() {
        let segments = vec![segment(0, 1.0), segment(1, 1.0)];
        let transport = Arc::new(
            FakeTransport::new()
                .respond(&segments[0].url, "a")
                .respond(&segments[1].url, "b"),
        );

        let result = coordinator(&transport)
            .download_segments(&segments, fast_options().with_max_concurrent(0))
            .await
            .unwrap();

        assert_eq!(result.data.as_ref(), b"ab");
        assert_eq!(transport.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn empty_segment_list_is_invalid_input() {
        let transport = Arc::new(FakeTransport::new());

        let err = coordinator(&transport)
            .download_segments(&[], DownloadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::InvalidInput { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn relative_segment_url_is_rejected_before_any_request() {
        let mut relative = segment(1, 1.0);
        relative.url = "seg1.ts".to_string();
        let segments = vec![segment(0, 1.0), relative];
        let transport = Arc::new(FakeTransport::new().respond(&segments[0].url, "a"));

        let err = coordinator(&transport)
            .download_segments(&segments, fast_options().with_max_retries(2))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::InvalidInput { .. }));
        assert!(err.to_string().contains("seg1.ts"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_requests() {
        let segments = vec![segment(0, 1.0), segment(1, 1.0)];
        let transport = Arc::new(FakeTransport::new().respond(&segments[0].url, "a"));
        let token = CancellationToken::new();
        token.cancel();

        let err = coordinator(&transport)
            .download_segments(&segments, fast_options().with_token(token))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_download_returns_no_partial_result() {
        let segments: Vec<Segment> = (0..4).map(|i| segment(i, 1.0)).collect();
        let mut transport = FakeTransport::new();
        for s in &segments {
            transport = transport.route(&s.url, delayed("x", 10_000));
        }
        let transport = Arc::new(transport);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let options = fast_options().with_max_concurrent(2).with_token(token);
        let err = coordinator(&transport)
            .download_segments(&segments, options)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_segment_aborts_download() {
        let segments = vec![segment(0, 1.0), segment(1, 1.0)];
        let missing = vec![FakeResponse::status(StatusCode::NOT_FOUND)];
        let transport = Arc::new(
            FakeTransport::new()
                .respond(&segments[0].url, "a")
                .route(&segments[1].url, missing),
        );

        let err = coordinator(&transport)
            .download_segments(&segments, fast_options().with_max_retries(2))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::RetryExhausted { .. }));
        assert!(err.to_string().contains("after 2 retries"));
        assert_eq!(transport.calls_to(&segments[1].url), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_progress_after_each_segment() {
        let segments: Vec<Segment> = (0..4).map(|i| segment(i, 1.0)).collect();
        let mut transport = FakeTransport::new();
        for (i, s) in segments.iter().enumerate() {
            transport = transport.route(&s.url, delayed(vec![0u8; 100], 100 * (i as u64 + 1)));
        }
        let transport = Arc::new(transport);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let percentages = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&percentages);

        coordinator(&transport)
            .download_segments(
                &segments,
                fast_options()
                    .with_max_concurrent(1)
                    .on_progress(|_| panic!("broken observer"))
                    .on_progress(move |p| recorder.lock().unwrap().push(p.percentage))
                    .with_progress_channel(tx),
            )
            .await
            .unwrap();

        assert_eq!(*percentages.lock().unwrap(), vec![25, 50, 75, 100]);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 4);
        let last = events.last().unwrap();
        assert_eq!(last.current_segment, 4);
        assert_eq!(last.total_segments, 4);
        assert_eq!(last.bytes_downloaded, 400);
        assert_eq!(last.eta, 0.0);
        assert!(events[0].speed > 0.0);
        assert!(events[0].eta > 0.0);
    }

    #[test]
    fn concatenate_skips_holes() {
        let joined = concatenate(&[
            Some(Bytes::from_static(b"ab")),
            None,
            Some(Bytes::from_static(b"cd")),
        ])
        .unwrap();
        assert_eq!(joined.as_ref(), b"abcd");
    }

    #[test]
    fn concatenate_rejects_empty_input() {
        assert!(matches!(
            concatenate(&[]),
            Err(DownloadError::InvalidInput { .. })
        ));
    }
}
