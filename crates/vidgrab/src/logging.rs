use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::DownloadError;

pub const DEFAULT_LOG_FILTER: &str = "vidgrab_engine=info,hls=info";

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `directive`; with neither set,
/// [`DEFAULT_LOG_FILTER`] is used. Fails if a global subscriber is already set.
pub fn init_tracing(directive: Option<&str>) -> Result<(), DownloadError> {
    tracing_subscriber::registry()
        .with(build_filter(directive)?)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| {
            DownloadError::configuration(format!("failed to install tracing subscriber: {e}"))
        })
}

fn build_filter(directive: Option<&str>) -> Result<EnvFilter, DownloadError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(directive.unwrap_or(DEFAULT_LOG_FILTER))
        .map_err(|e| DownloadError::configuration(format!("invalid log filter: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_directive() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(matches!(
            build_filter(Some("vidgrab_engine=loud")),
            Err(DownloadError::Configuration { .. })
        ));
        assert!(build_filter(Some("vidgrab_engine=debug")).is_ok());
        assert!(build_filter(None).is_ok());
    }
}
