use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::DownloadError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Configurable options for the HTTP side of the engine
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a single HTTP request (zero disables it)
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Read timeout (maximum time between receiving data chunks)
    pub read_timeout: Duration,

    /// Upper bound for one segment fetch attempt. A timed out attempt counts
    /// as a failed attempt and is retried.
    pub segment_timeout: Option<Duration>,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Headers sent with every request, before per-call headers are applied
    pub headers: HeaderMap,

    /// Maximum idle connections to keep per host
    pub pool_max_idle_per_host: usize,

    /// Duration to keep idle connections alive before closing
    pub pool_idle_timeout: Duration,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(0),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            segment_timeout: Some(Duration::from_secs(30)),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            // Segment downloads hit the same CDN host many times in parallel
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(30),
        }
    }
}

impl DownloaderConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_segment_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.segment_timeout = timeout;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Adds a default header. Invalid names or values are rejected.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, DownloadError> {
        let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| DownloadError::configuration(format!("invalid header {name}: {e}")))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            DownloadError::configuration(format!("invalid value for header {name}: {e}"))
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate, br"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Create a reqwest Client with the provided configuration.
///
/// The client keeps no cookie store; credentials only travel in headers the
/// caller passes explicitly.
pub fn create_client(config: &DownloaderConfig) -> Result<Client, DownloadError> {
    install_rustls_provider();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(config.pool_idle_timeout)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.read_timeout.is_zero() {
        client_builder = client_builder.read_timeout(config.read_timeout);
    }

    client_builder.build().map_err(DownloadError::from)
}
