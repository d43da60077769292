use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download cancelled")]
    Cancelled,

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("no downloadable video found at `{url}`")]
    Unsupported { url: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("empty response body during {operation} for {url}")]
    EmptyBody {
        url: String,
        operation: &'static str,
    },

    #[error("operation timed out: {reason}")]
    Timeout { reason: String },

    #[error("failed after {retries} retries: {last_error}")]
    RetryExhausted { retries: u32, last_error: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl DownloadError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn empty_body(url: impl Into<String>, operation: &'static str) -> Self {
        Self::EmptyBody {
            url: url.into(),
            operation,
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether another attempt at the same request could succeed.
    ///
    /// Every per-attempt fetch failure counts, client error statuses included.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled
            | Self::InvalidInput { .. }
            | Self::InvalidUrl { .. }
            | Self::Unsupported { .. }
            | Self::RetryExhausted { .. }
            | Self::Configuration { .. } => false,
            Self::Network { source } => !source.is_builder() && !source.is_redirect(),
            Self::HttpStatus { .. } | Self::EmptyBody { .. } | Self::Timeout { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://a/b.ts";

    #[test]
    fn retry_exhausted_names_retry_count() {
        let last = DownloadError::http_status(StatusCode::SERVICE_UNAVAILABLE, URL, "segment");
        let err = DownloadError::RetryExhausted {
            retries: 2,
            last_error: last.to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("2 retries"));
        assert!(message.contains("503"));
    }

    #[test]
    fn classification() {
        assert!(!DownloadError::Cancelled.is_retryable());
        assert!(DownloadError::Cancelled.is_cancelled());
        assert!(!DownloadError::invalid_input("no segments").is_retryable());
        let relative = DownloadError::invalid_url("seg.ts", "relative URL");
        assert!(!relative.is_retryable());

        let not_found = DownloadError::http_status(StatusCode::NOT_FOUND, URL, "segment");
        assert!(not_found.is_retryable());
        assert!(DownloadError::empty_body(URL, "segment").is_retryable());

        let exhausted = DownloadError::RetryExhausted {
            retries: 3,
            last_error: String::new(),
        };
        assert!(!exhausted.is_retryable());
    }
}
