//! Tracing subscriber setup.
//!
//! Log lines go to stderr so stdout stays free for command output.

use crate::domain::config_validation::LogFormat;
use crate::ports::config_port::ConfigPort;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingSettings {
    /// Reads `[logging] level` and `format`. An unknown format falls back to text;
    /// `validate_config` reports it separately.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let format = match config.get_string_or("logging", "format", "text").to_lowercase().as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self {
            level: config.get_string_or("logging", "level", "info"),
            format,
        }
    }

    /// Install the global subscriber. `RUST_LOG` wins over the configured level.
    /// A second call is a no-op.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let installed = match self.format {
            LogFormat::Json => fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
            LogFormat::Text => fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        if installed.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    }
}
