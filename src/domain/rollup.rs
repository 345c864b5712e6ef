//! Cross-report rollups over stored summaries and trades.

use super::labels::{Instrument, ReportKey, Schedule};
use super::ledger::CompletedTrade;
use super::statement::ReportSummary;
use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A persisted report summary with its generated id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReport {
    pub id: i64,
    pub key: ReportKey,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub instrument: Option<Instrument>,
    pub schedule: Option<Schedule>,
    pub agent: Option<String>,
}

impl ReportFilter {
    pub fn matches(&self, key: &ReportKey) -> bool {
        self.instrument.is_none_or(|i| i == key.instrument)
            && self.schedule.is_none_or(|s| s == key.schedule)
            && self.agent.as_ref().is_none_or(|a| *a == key.agent)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownRollup {
    pub instrument: Instrument,
    pub schedule: Schedule,
    pub max_balance_drawdown: Option<f64>,
    pub max_equity_drawdown: Option<f64>,
    pub max_balance_drawdown_pct: Option<f64>,
    pub max_equity_drawdown_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WinRateRollup {
    pub instrument: Instrument,
    pub schedule: Schedule,
    pub avg_win_rate: Option<f64>,
    pub avg_loss_rate: Option<f64>,
    pub profitable_trades: i64,
    pub total_trades: i64,
    pub overall_win_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPnl {
    /// First day of the month.
    pub month: NaiveDate,
    pub pnl: f64,
    pub trades: usize,
}

fn group<'a>(
    reports: &'a [StoredReport],
    filter: &ReportFilter,
) -> BTreeMap<(Instrument, Schedule), Vec<&'a ReportSummary>> {
    let mut groups: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for report in reports.iter().filter(|r| filter.matches(&r.key)) {
        groups
            .entry((report.key.instrument, report.key.schedule))
            .or_default()
            .push(&report.summary);
    }
    groups
}

fn max_of<F>(summaries: &[&ReportSummary], field: F) -> Option<f64>
where
    F: Fn(&ReportSummary) -> Option<f64>,
{
    summaries
        .iter()
        .filter_map(|s| field(*s))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

fn mean_of<F>(summaries: &[&ReportSummary], field: F) -> Option<f64>
where
    F: Fn(&ReportSummary) -> Option<f64>,
{
    let values: Vec<f64> = summaries.iter().filter_map(|s| field(*s)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Absent values sort after present ones, larger values first.
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Worst drawdowns per (instrument, schedule), worst balance drawdown first.
pub fn drawdown_rollup(reports: &[StoredReport], filter: &ReportFilter) -> Vec<DrawdownRollup> {
    let mut rows: Vec<DrawdownRollup> = group(reports, filter)
        .into_iter()
        .map(|((instrument, schedule), summaries)| DrawdownRollup {
            instrument,
            schedule,
            max_balance_drawdown: max_of(&summaries, |s| s.balance_drawdown_maximal),
            max_equity_drawdown: max_of(&summaries, |s| s.equity_drawdown_maximal),
            max_balance_drawdown_pct: max_of(&summaries, |s| s.balance_drawdown_relative),
            max_equity_drawdown_pct: max_of(&summaries, |s| s.equity_drawdown_relative),
        })
        .collect();
    rows.sort_by(|a, b| descending(a.max_balance_drawdown, b.max_balance_drawdown));
    rows
}

/// Win/loss rates per (instrument, schedule), best overall win rate first.
pub fn win_rate_rollup(reports: &[StoredReport], filter: &ReportFilter) -> Vec<WinRateRollup> {
    let mut rows: Vec<WinRateRollup> = group(reports, filter)
        .into_iter()
        .map(|((instrument, schedule), summaries)| {
            let profitable_trades: i64 =
                summaries.iter().filter_map(|s| s.profitable_trades).sum();
            let total_trades: i64 = summaries.iter().filter_map(|s| s.total_trades).sum();
            let overall_win_rate = (total_trades > 0).then(|| {
                let pct = profitable_trades as f64 / total_trades as f64 * 100.0;
                (pct * 100.0).round() / 100.0
            });
            WinRateRollup {
                instrument,
                schedule,
                avg_win_rate: mean_of(&summaries, |s| s.win_rate),
                avg_loss_rate: mean_of(&summaries, |s| s.loss_rate),
                profitable_trades,
                total_trades,
                overall_win_rate,
            }
        })
        .collect();
    rows.sort_by(|a, b| descending(a.overall_win_rate, b.overall_win_rate));
    rows
}

/// Realized profit per calendar month of trade close, oldest month first.
pub fn monthly_pnl(trades: &[CompletedTrade]) -> Vec<MonthlyPnl> {
    let mut months: BTreeMap<NaiveDate, MonthlyPnl> = BTreeMap::new();
    for trade in trades {
        let date = trade.time.date();
        let Some(month) = NaiveDate::from_ymd_opt(date.year(), date.month(), 1) else {
            continue;
        };
        let entry = months.entry(month).or_insert(MonthlyPnl {
            month,
            pnl: 0.0,
            trades: 0,
        });
        entry.pnl += trade.profit;
        entry.trades += 1;
    }
    months.into_values().collect()
}
