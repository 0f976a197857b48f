//! Logging for the Trellis runtime.
//!
//! Thin wrapper around `tracing`: re-exports the level macros used across
//! the crate and owns a small [`LogConfig`] initializer. The `RUST_LOG`
//! environment variable overrides the configured filter when set.

pub use tracing::{debug, error, info, trace, warn};

use tracing_subscriber::EnvFilter;

/// Output format for the subscriber installed by [`LogConfig::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Subscriber configuration with builder-style setters.
#[derive(Debug, Clone)]
pub struct LogConfig {
    filter: String,
    format: LogFormat,
}

impl LogConfig {
    pub fn new() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Json,
        }
    }

    /// Set the default filter directive, e.g. `"trellis_core=debug"`.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Install the global subscriber. Harmless if one is already set,
    /// so tests can call this repeatedly.
    pub fn init(self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.filter));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);

        let result = match self.format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Compact => builder.compact().try_init(),
        };

        if result.is_err() {
            trace!("global subscriber already installed, keeping it");
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}
