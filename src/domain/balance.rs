//! Balance/equity time series from the tab-separated tester export.

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use tracing::debug;

const DATE_COLUMN: &str = "<DATE>";
const BALANCE_COLUMN: &str = "<BALANCE>";
const EQUITY_COLUMN: &str = "<EQUITY>";
const DEPOSIT_LOAD_COLUMNS: [&str; 2] = ["<DEPOSIT LOAD>", "<DEPOSIT_LOAD>"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSample {
    pub date_time: NaiveDateTime,
    pub balance: f64,
    pub equity: f64,
    pub deposit_load: f64,
}

/// Positions of the named columns in the header row.
#[derive(Debug, Default)]
struct ColumnMap {
    date: Option<usize>,
    balance: Option<usize>,
    equity: Option<usize>,
    deposit_load: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h == name);
        Self {
            date: find(DATE_COLUMN),
            balance: find(BALANCE_COLUMN),
            equity: find(EQUITY_COLUMN),
            deposit_load: DEPOSIT_LOAD_COLUMNS.iter().find_map(|name| find(name)),
        }
    }
}

/// Parse a `YYYY.MM.DD HH:MM` stamp; a bare date means midnight.
pub fn parse_balance_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y.%m.%d %H:%M")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y.%m.%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn amount(text: Option<&str>) -> f64 {
    text.map(|t| t.split_whitespace().collect::<String>())
        .and_then(|t| t.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn sample_from_record(record: &StringRecord, columns: &ColumnMap) -> Option<BalanceSample> {
    let date = record.get(columns.date?)?;
    let balance = record.get(columns.balance?)?;
    let equity = record.get(columns.equity?)?;
    if date.is_empty() {
        return None;
    }

    let deposit_load = columns
        .deposit_load
        .and_then(|idx| record.get(idx))
        .filter(|t| !t.is_empty());

    Some(BalanceSample {
        date_time: parse_balance_time(date)?,
        balance: amount(Some(balance)),
        equity: amount(Some(equity)),
        deposit_load: amount(deposit_load),
    })
}

/// Parse a decoded balance CSV.
///
/// Rows lacking a date, balance or equity column and rows with an invalid
/// date are skipped. Unparseable numbers read as 0.0. Samples come back in
/// ascending time order, ties keeping their file order.
pub fn parse_balance_csv(text: &str) -> Vec<BalanceSample> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let columns = match reader.headers() {
        Ok(headers) => ColumnMap::from_headers(headers),
        Err(e) => {
            debug!(error = %e, "balance export has no readable header");
            return Vec::new();
        }
    };

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        let Ok(record) = result else {
            skipped += 1;
            continue;
        };
        if record.iter().all(str::is_empty) {
            continue;
        }
        match sample_from_record(&record, &columns) {
            Some(sample) => samples.push(sample),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "skipped malformed balance rows");
    }

    samples.sort_by_key(|s| s.date_time);
    samples
}
