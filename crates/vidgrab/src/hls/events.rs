use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Snapshot emitted after every completed segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    /// Number of segments completed so far
    pub current_segment: usize,
    pub total_segments: usize,
    /// `round(completed / total * 100)`
    pub percentage: u32,
    pub bytes_downloaded: u64,
    /// Bytes per second since the download started
    pub speed: f64,
    /// Estimated seconds until completion
    pub eta: f64,
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &DownloadProgress);
}

impl ProgressObserver for mpsc::UnboundedSender<DownloadProgress> {
    fn on_progress(&self, progress: &DownloadProgress) {
        if self.send(progress.clone()).is_err() {
            trace!("Progress receiver dropped");
        }
    }
}

/// Adapter turning a closure into a [`ProgressObserver`].
pub struct FnObserver<F>(pub F);

impl<F> ProgressObserver for FnObserver<F>
where
    F: Fn(&DownloadProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &DownloadProgress) {
        (self.0)(progress)
    }
}

impl<F> fmt::Debug for FnObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnObserver")
    }
}

/// Delivers `progress` to every observer. A panicking observer is logged and
/// skipped; the remaining observers still run.
pub(crate) fn notify_observers(
    observers: &[Arc<dyn ProgressObserver>],
    progress: &DownloadProgress,
) {
    for (position, observer) in observers.iter().enumerate() {
        let outcome = catch_unwind(AssertUnwindSafe(|| observer.on_progress(progress)));
        if outcome.is_err() {
            warn!(
                observer = position,
                segment = progress.current_segment,
                "Progress observer panicked"
            );
        }
    }
}
