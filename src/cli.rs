//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::report_dir::{read_bytes, ReportDirectory};
use crate::domain::balance::BalanceSample;
use crate::domain::config_validation::{backend, validate_config, Backend, IngestSettings};
use crate::domain::error::TradeStatsError;
use crate::domain::labels::{Instrument, ReportKey, Schedule};
use crate::domain::ledger::CompletedTrade;
use crate::domain::naming::{detect_agent, detect_instrument, detect_schedule};
use crate::domain::report::{balance_from_bytes, StatementFile};
use crate::domain::rollup::{drawdown_rollup, monthly_pnl, win_rate_rollup, ReportFilter};
use crate::domain::statement::ReportSummary;
use crate::logging::LoggingSettings;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_store::ReportStore;

#[derive(Parser, Debug)]
#[command(name = "tradestats", about = "MT5 strategy report ingestion")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and store every report directory under ROOT
    Ingest {
        #[arg(short, long)]
        config: PathBuf,
        root: PathBuf,
    },
    /// Parse one statement and print it as JSON without storing it
    Parse {
        statement: PathBuf,
        #[arg(short, long)]
        balance: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create the database schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List stored reports with drawdown and win-rate rollups
    Reports {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        instrument: Option<Instrument>,
        #[arg(long)]
        schedule: Option<Schedule>,
        #[arg(long)]
        agent: Option<String>,
    },
    /// Monthly profit of one stored report
    Monthly {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        instrument: Instrument,
        #[arg(long)]
        schedule: Schedule,
        #[arg(long)]
        agent: Option<String>,
    },
    /// Balance and equity series of one stored report
    Balance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        instrument: Instrument,
        #[arg(long)]
        schedule: Schedule,
        #[arg(long)]
        agent: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Ingest { config, root } => run_ingest(&config, &root),
        Command::Parse {
            statement,
            balance,
            output,
        } => run_parse(&statement, balance.as_deref(), output.as_deref()),
        Command::InitDb { config } => run_init_db(&config),
        Command::Reports {
            config,
            instrument,
            schedule,
            agent,
        } => run_reports(
            &config,
            &ReportFilter {
                instrument,
                schedule,
                agent,
            },
        ),
        Command::Monthly {
            config,
            instrument,
            schedule,
            agent,
        } => run_monthly(&config, instrument, schedule, agent),
        Command::Balance {
            config,
            instrument,
            schedule,
            agent,
        } => run_balance(&config, instrument, schedule, agent),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load and validate the config file, then install logging from it.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TradeStatsError> {
    let config = FileConfigAdapter::from_file(path)?;
    validate_config(&config)?;
    LoggingSettings::from_config(&config).init();
    debug!(config = %path.display(), "config loaded");
    Ok(config)
}

/// Open the configured report store. The caller owns the handle for the
/// lifetime of the command.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn ReportStore>, TradeStatsError> {
    match backend(config)? {
        Backend::Sqlite => open_sqlite(config),
        Backend::Postgres => open_postgres(config),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn ReportStore>, TradeStatsError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    Ok(Box::new(SqliteAdapter::from_config(config)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn ReportStore>, TradeStatsError> {
    Err(TradeStatsError::ConfigInvalid {
        section: "database".into(),
        key: "backend".into(),
        reason: "built without the sqlite feature".into(),
    })
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &dyn ConfigPort) -> Result<Box<dyn ReportStore>, TradeStatsError> {
    use crate::adapters::postgres_adapter::PostgresAdapter;
    Ok(Box::new(PostgresAdapter::from_config(config)?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &dyn ConfigPort) -> Result<Box<dyn ReportStore>, TradeStatsError> {
    Err(TradeStatsError::ConfigInvalid {
        section: "database".into(),
        key: "backend".into(),
        reason: "built without the postgres feature".into(),
    })
}

/// Result of one ingest run.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub ingested: Vec<ReportKey>,
    /// Directory names that failed, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// Resolve the report key of a directory. The instrument found in the
/// statement wins over the one in the directory name.
pub fn resolve_key(
    dir_name: &str,
    statement: &StatementFile,
    default_agent: &str,
) -> Result<ReportKey, TradeStatsError> {
    let instrument = statement
        .parsed
        .summary
        .instrument
        .or_else(|| detect_instrument(dir_name))
        .ok_or_else(|| TradeStatsError::MissingLabel {
            label: "instrument".into(),
            source_name: dir_name.to_string(),
        })?;
    let schedule = detect_schedule(dir_name).ok_or_else(|| TradeStatsError::MissingLabel {
        label: "schedule".into(),
        source_name: dir_name.to_string(),
    })?;
    let agent = detect_agent(dir_name, Some(&statement.text), default_agent);

    Ok(ReportKey {
        instrument,
        schedule,
        agent,
    })
}

fn store_balance(
    store: &dyn ReportStore,
    dir: &ReportDirectory,
    report_id: i64,
    key: &ReportKey,
    settings: &IngestSettings,
) -> Result<usize, TradeStatsError> {
    let Some(path) = dir.balance_file(&settings.balance_marker)? else {
        debug!(dir = %dir.name, "no balance file");
        return Ok(0);
    };
    let (samples, encoding) = balance_from_bytes(&read_bytes(&path)?);
    debug!(file = %path.display(), %encoding, "balance decoded");
    store.replace_balance(report_id, key, &samples)?;
    Ok(samples.len())
}

/// Parse one report directory and replace its stored summary, trades and
/// balance samples.
pub fn ingest_directory(
    store: &dyn ReportStore,
    dir: &ReportDirectory,
    settings: &IngestSettings,
) -> Result<ReportKey, TradeStatsError> {
    let statement_path = dir
        .statement_file(&settings.statement_marker)?
        .ok_or_else(|| TradeStatsError::NoStatement {
            dir: dir.name.clone(),
        })?;
    let statement = StatementFile::from_bytes(&read_bytes(&statement_path)?);
    let key = resolve_key(&dir.name, &statement, &settings.default_agent)?;

    let summary = ReportSummary {
        instrument: Some(key.instrument),
        ..statement.parsed.summary.clone()
    };
    let report_id = store.upsert_report(&key, &summary)?;

    let trades: Vec<CompletedTrade> = if settings.keep_unmatched {
        statement.parsed.trades.clone()
    } else {
        statement.parsed.closed_trades().cloned().collect()
    };
    store.replace_trades(report_id, &key, &trades)?;

    // A balance failure leaves the stored summary and trades in place.
    let balance_count = match store_balance(store, dir, report_id, &key, settings) {
        Ok(count) => count,
        Err(e) => {
            warn!(dir = %dir.name, error = %e, "balance export not stored");
            0
        }
    };

    info!(
        report = %key,
        id = report_id,
        encoding = %statement.encoding,
        trades = trades.len(),
        balance = balance_count,
        "ingested report"
    );
    Ok(key)
}

/// Ingest every report directory under `root`. A directory that fails is
/// logged and skipped; only an unreadable root is an error.
pub fn run_ingest_pipeline(
    store: &dyn ReportStore,
    root: &Path,
    settings: &IngestSettings,
) -> Result<IngestOutcome, TradeStatsError> {
    let dirs = ReportDirectory::scan(root)?;
    info!(root = %root.display(), directories = dirs.len(), "scanning report directories");

    let mut outcome = IngestOutcome::default();
    for dir in &dirs {
        match ingest_directory(store, dir, settings) {
            Ok(key) => outcome.ingested.push(key),
            Err(e) => {
                warn!(dir = %dir.name, error = %e, "skipping report directory");
                outcome.skipped.push((dir.name.clone(), e.to_string()));
            }
        }
    }

    info!(
        ingested = outcome.ingested.len(),
        skipped = outcome.skipped.len(),
        "ingest finished"
    );
    Ok(outcome)
}

fn run_ingest(config_path: &Path, root: &Path) -> Result<(), TradeStatsError> {
    let config = load_config(config_path)?;
    let settings = IngestSettings::from_config(&config);
    let store = open_store(&config)?;
    store.initialize_schema()?;

    let outcome = run_ingest_pipeline(store.as_ref(), root, &settings)?;
    println!(
        "Ingested {} report(s), skipped {}",
        outcome.ingested.len(),
        outcome.skipped.len()
    );
    for (name, reason) in &outcome.skipped {
        println!("  skipped {name}: {reason}");
    }
    Ok(())
}

fn run_init_db(config_path: &Path) -> Result<(), TradeStatsError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    store.initialize_schema()?;
    info!("schema initialized");
    println!("Schema initialized");
    Ok(())
}

/// JSON document printed by `parse`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseDocument {
    pub statement_encoding: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_encoding: Option<String>,
    pub summary: ReportSummary,
    pub trades: Vec<CompletedTrade>,
    pub balance: Vec<BalanceSample>,
    pub trade_count: usize,
    pub closed_trade_count: usize,
    pub balance_count: usize,
}

pub fn parse_document(statement_bytes: &[u8], balance_bytes: Option<&[u8]>) -> ParseDocument {
    let statement = StatementFile::from_bytes(statement_bytes);
    let (balance, balance_encoding) = match balance_bytes {
        Some(bytes) => {
            let (samples, encoding) = balance_from_bytes(bytes);
            (samples, Some(encoding.to_string()))
        }
        None => (Vec::new(), None),
    };
    let closed_trade_count = statement.parsed.closed_trades().count();

    ParseDocument {
        statement_encoding: statement.encoding.to_string(),
        balance_encoding,
        trade_count: statement.parsed.trades.len(),
        closed_trade_count,
        balance_count: balance.len(),
        summary: statement.parsed.summary,
        trades: statement.parsed.trades,
        balance,
    }
}

fn run_parse(
    statement_path: &Path,
    balance_path: Option<&Path>,
    output_path: Option<&Path>,
) -> Result<(), TradeStatsError> {
    LoggingSettings::default().init();

    let statement_bytes = read_bytes(statement_path)?;
    let balance_bytes = balance_path.map(read_bytes).transpose()?;
    let document = parse_document(&statement_bytes, balance_bytes.as_deref());
    info!(
        statement = %statement_path.display(),
        trades = document.trade_count,
        closed = document.closed_trade_count,
        balance = document.balance_count,
        "statement parsed"
    );

    let json = serde_json::to_string_pretty(&document)?;
    match output_path {
        Some(path) => {
            fs::write(path, json)?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn fmt_opt_int(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn run_reports(config_path: &Path, filter: &ReportFilter) -> Result<(), TradeStatsError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let reports: Vec<_> = store
        .list_reports()?
        .into_iter()
        .filter(|r| filter.matches(&r.key))
        .collect();

    if reports.is_empty() {
        println!("No stored reports");
        return Ok(());
    }

    println!(
        "{:>4}  {:<6} {:<15} {:<28} {:>12} {:>8} {:>8}",
        "Id", "Instr", "Schedule", "Agent", "Net Profit", "Trades", "Win %"
    );
    for report in &reports {
        println!(
            "{:>4}  {:<6} {:<15} {:<28} {:>12} {:>8} {:>8}",
            report.id,
            report.key.instrument.code(),
            report.key.schedule.label(),
            report.key.agent,
            fmt_opt(report.summary.net_profit),
            fmt_opt_int(report.summary.total_trades),
            fmt_opt(report.summary.win_rate),
        );
    }

    println!();
    println!("Drawdown by instrument and schedule");
    println!(
        "  {:<6} {:<15} {:>12} {:>12} {:>10} {:>10}",
        "Instr", "Schedule", "Max Bal DD", "Max Eq DD", "Bal DD %", "Eq DD %"
    );
    for row in drawdown_rollup(&reports, filter) {
        println!(
            "  {:<6} {:<15} {:>12} {:>12} {:>10} {:>10}",
            row.instrument.code(),
            row.schedule.label(),
            fmt_opt(row.max_balance_drawdown),
            fmt_opt(row.max_equity_drawdown),
            fmt_opt(row.max_balance_drawdown_pct),
            fmt_opt(row.max_equity_drawdown_pct),
        );
    }

    println!();
    println!("Win rate by instrument and schedule");
    println!(
        "  {:<6} {:<15} {:>10} {:>10} {:>10} {:>10}",
        "Instr", "Schedule", "Avg Win %", "Avg Loss %", "Won/Total", "Overall %"
    );
    for row in win_rate_rollup(&reports, filter) {
        println!(
            "  {:<6} {:<15} {:>10} {:>10} {:>10} {:>10}",
            row.instrument.code(),
            row.schedule.label(),
            fmt_opt(row.avg_win_rate),
            fmt_opt(row.avg_loss_rate),
            format!("{}/{}", row.profitable_trades, row.total_trades),
            fmt_opt(row.overall_win_rate),
        );
    }

    Ok(())
}

/// Id of the stored report for `key`; an unknown key is a `MissingLabel`.
fn stored_report_id(store: &dyn ReportStore, key: &ReportKey) -> Result<i64, TradeStatsError> {
    store
        .report_id(key)?
        .ok_or_else(|| TradeStatsError::MissingLabel {
            label: "stored report".into(),
            source_name: key.to_string(),
        })
}

fn stored_key(
    config: &dyn ConfigPort,
    instrument: Instrument,
    schedule: Schedule,
    agent: Option<String>,
) -> ReportKey {
    ReportKey {
        instrument,
        schedule,
        agent: agent.unwrap_or_else(|| IngestSettings::from_config(config).default_agent),
    }
}

fn run_monthly(
    config_path: &Path,
    instrument: Instrument,
    schedule: Schedule,
    agent: Option<String>,
) -> Result<(), TradeStatsError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let key = stored_key(&config, instrument, schedule, agent);
    let report_id = stored_report_id(store.as_ref(), &key)?;

    let trades = store.trades_for(report_id)?;
    println!("Monthly PnL for {key}");
    println!("  {:<8} {:>12} {:>8}", "Month", "PnL", "Trades");
    for month in monthly_pnl(&trades) {
        println!(
            "  {:<8} {:>12.2} {:>8}",
            month.month.format("%Y-%m"),
            month.pnl,
            month.trades
        );
    }
    Ok(())
}

fn run_balance(
    config_path: &Path,
    instrument: Instrument,
    schedule: Schedule,
    agent: Option<String>,
) -> Result<(), TradeStatsError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let key = stored_key(&config, instrument, schedule, agent);
    let report_id = stored_report_id(store.as_ref(), &key)?;

    let samples = store.balance_for(report_id)?;
    println!("Balance and equity for {key}");
    println!(
        "  {:<19} {:>12} {:>12} {:>8}",
        "Time", "Balance", "Equity", "Load"
    );
    for sample in &samples {
        println!(
            "  {:<19} {:>12.2} {:>12.2} {:>8.4}",
            sample.date_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            sample.balance,
            sample.equity,
            sample.deposit_load
        );
    }
    Ok(())
}
