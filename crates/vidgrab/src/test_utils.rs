//! Scripted `HttpFetch` used by the engine's unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::DownloadError;
use crate::transport::{FetchRequest, HttpFetch};

/// Initialize tracing for tests with appropriate settings
#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct FakeResponse {
    pub delay: Duration,
    pub outcome: Result<Bytes, StatusCode>,
}

impl FakeResponse {
    pub fn body(body: impl Into<Bytes>) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(body.into()),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(status),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Each URL owns a script of responses; the last one repeats forever.
/// Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<FakeResponse>>>,
    head_lengths: Mutex<HashMap<String, Option<u64>>>,
    calls: Mutex<Vec<String>>,
    seen_headers: Mutex<Vec<HeaderMap>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, script: Vec<FakeResponse>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), script.into());
        self
    }

    pub fn respond(self, url: &str, body: impl Into<Bytes>) -> Self {
        self.route(url, vec![FakeResponse::body(body)])
    }

    pub fn head(self, url: &str, length: Option<u64>) -> Self {
        self.head_lengths
            .lock()
            .unwrap()
            .insert(url.to_string(), length);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| *u == url)
            .count()
    }

    pub fn seen_headers(&self) -> Vec<HeaderMap> {
        self.seen_headers.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> FakeResponse {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) => script
                .front()
                .cloned()
                .unwrap_or_else(|| FakeResponse::status(StatusCode::NOT_FOUND)),
            None => FakeResponse::status(StatusCode::NOT_FOUND),
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpFetch for FakeTransport {
    async fn get(&self, request: FetchRequest<'_>) -> Result<Bytes, DownloadError> {
        let url = request.url;
        self.calls.lock().unwrap().push(url.to_string());
        self.seen_headers
            .lock()
            .unwrap()
            .push(request.headers.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let response = self.next_response(url);
        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }
        match response.outcome {
            Ok(body) => Ok(body),
            Err(status) => Err(DownloadError::http_status(status, url, request.operation)),
        }
    }

    async fn content_length(
        &self,
        url: &str,
        _headers: &HeaderMap,
    ) -> Result<Option<u64>, DownloadError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.head_lengths.lock().unwrap().get(url) {
            Some(length) => Ok(*length),
            None => Err(DownloadError::http_status(
                StatusCode::NOT_FOUND,
                url,
                "size check",
            )),
        }
    }
}
