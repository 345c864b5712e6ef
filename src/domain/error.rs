//! Domain error types.
//!
//! Parsing never fails: malformed rows and missing labels are absorbed by the
//! parsers. These variants cover the I/O, configuration and persistence
//! boundaries around them.

/// Top-level error type for tradestats.
#[derive(Debug, thiserror::Error)]
pub enum TradeStatsError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("could not resolve {label} for {source_name}")]
    MissingLabel { label: String, source_name: String },

    #[error("no statement file in {dir}")]
    NoStatement { dir: String },

    #[error("failed to serialize output: {reason}")]
    Serialize { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TradeStatsError {
    fn from(err: serde_json::Error) -> Self {
        TradeStatsError::Serialize {
            reason: err.to_string(),
        }
    }
}

impl From<&TradeStatsError> for std::process::ExitCode {
    fn from(err: &TradeStatsError) -> Self {
        let code: u8 = match err {
            TradeStatsError::Io(_) => 1,
            TradeStatsError::ConfigParse { .. }
            | TradeStatsError::ConfigMissing { .. }
            | TradeStatsError::ConfigInvalid { .. } => 2,
            TradeStatsError::Database { .. } | TradeStatsError::DatabaseQuery { .. } => 3,
            TradeStatsError::MissingLabel { .. } | TradeStatsError::NoStatement { .. } => 4,
            TradeStatsError::Serialize { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
