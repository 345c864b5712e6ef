//! Configuration validation.
//!
//! Checked before any database connection is opened.

use crate::domain::error::TradeStatsError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_AGENT: &str = "Breakout EA by currency pro";
pub const DEFAULT_STATEMENT_MARKER: &str = "report";
pub const DEFAULT_BALANCE_MARKER: &str = "balance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TradeStatsError> {
    let backend = backend(config)?;
    if backend == Backend::Sqlite {
        validate_sqlite(config)?;
    }
    log_format(config)?;
    validate_markers(config)?;
    Ok(())
}

pub fn backend(config: &dyn ConfigPort) -> Result<Backend, TradeStatsError> {
    let value = config.get_string_or("database", "backend", "sqlite");
    match value.to_lowercase().as_str() {
        "sqlite" => Ok(Backend::Sqlite),
        "postgres" | "postgresql" => Ok(Backend::Postgres),
        _ => Err(TradeStatsError::ConfigInvalid {
            section: "database".to_string(),
            key: "backend".to_string(),
            reason: format!("unknown backend '{value}' (expected sqlite or postgres)"),
        }),
    }
}

pub fn log_format(config: &dyn ConfigPort) -> Result<LogFormat, TradeStatsError> {
    let value = config.get_string_or("logging", "format", "text");
    match value.to_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(TradeStatsError::ConfigInvalid {
            section: "logging".to_string(),
            key: "format".to_string(),
            reason: format!("unknown format '{value}' (expected text or json)"),
        }),
    }
}

fn validate_sqlite(config: &dyn ConfigPort) -> Result<(), TradeStatsError> {
    if config
        .get_string("sqlite", "path")
        .is_none_or(|p| p.trim().is_empty())
    {
        return Err(TradeStatsError::ConfigMissing {
            section: "sqlite".to_string(),
            key: "path".to_string(),
        });
    }
    if config.get_int("sqlite", "pool_size", 4) < 1 {
        return Err(TradeStatsError::ConfigInvalid {
            section: "sqlite".to_string(),
            key: "pool_size".to_string(),
            reason: "pool_size must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_markers(config: &dyn ConfigPort) -> Result<(), TradeStatsError> {
    for key in ["statement_marker", "balance_marker"] {
        let value = config.get_string("ingest", key).unwrap_or_default();
        if value.contains(['/', '\\']) {
            return Err(TradeStatsError::ConfigInvalid {
                section: "ingest".to_string(),
                key: key.to_string(),
                reason: "marker must be part of a file name, not a path".to_string(),
            });
        }
    }
    Ok(())
}

/// Settings of the ingest pipeline, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    pub default_agent: String,
    pub keep_unmatched: bool,
    pub statement_marker: String,
    pub balance_marker: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            default_agent: DEFAULT_AGENT.to_string(),
            keep_unmatched: false,
            statement_marker: DEFAULT_STATEMENT_MARKER.to_string(),
            balance_marker: DEFAULT_BALANCE_MARKER.to_string(),
        }
    }
}

impl IngestSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        Self {
            default_agent: config.get_string_or("ingest", "default_agent", DEFAULT_AGENT),
            keep_unmatched: config.get_bool("ingest", "keep_unmatched", false),
            statement_marker: config.get_string_or(
                "ingest",
                "statement_marker",
                DEFAULT_STATEMENT_MARKER,
            ),
            balance_marker: config.get_string_or(
                "ingest",
                "balance_marker",
                DEFAULT_BALANCE_MARKER,
            ),
        }
    }
}
