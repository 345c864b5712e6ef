#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tradestats::domain::balance::BalanceSample;
use tradestats::domain::error::TradeStatsError;
use tradestats::domain::labels::ReportKey;
use tradestats::domain::ledger::CompletedTrade;
use tradestats::domain::rollup::StoredReport;
use tradestats::domain::statement::ReportSummary;
use tradestats::ports::report_store::ReportStore;

#[derive(Default)]
struct MockState {
    next_id: i64,
    reports: HashMap<ReportKey, (i64, ReportSummary)>,
    trades: HashMap<i64, Vec<CompletedTrade>>,
    balance: HashMap<i64, Vec<BalanceSample>>,
}

/// In-memory `ReportStore` keyed the same way as the database adapters.
#[derive(Default)]
pub struct MockReportStore {
    state: RefCell<MockState>,
    pub fail_upserts: bool,
    pub fail_balance: bool,
}

impl MockReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_upserts: true,
            ..Self::default()
        }
    }

    pub fn failing_balance() -> Self {
        Self {
            fail_balance: true,
            ..Self::default()
        }
    }

    pub fn report_count(&self) -> usize {
        self.state.borrow().reports.len()
    }

    pub fn summary(&self, key: &ReportKey) -> Option<ReportSummary> {
        self.state.borrow().reports.get(key).map(|(_, s)| s.clone())
    }
}

impl ReportStore for MockReportStore {
    fn initialize_schema(&self) -> Result<(), TradeStatsError> {
        Ok(())
    }

    fn upsert_report(
        &self,
        key: &ReportKey,
        summary: &ReportSummary,
    ) -> Result<i64, TradeStatsError> {
        if self.fail_upserts {
            return Err(TradeStatsError::DatabaseQuery {
                reason: "mock upsert failure".into(),
            });
        }
        let mut state = self.state.borrow_mut();
        let id = match state.reports.get(key) {
            Some((id, _)) => *id,
            None => {
                state.next_id += 1;
                state.next_id
            }
        };
        state.reports.insert(key.clone(), (id, summary.clone()));
        Ok(id)
    }

    fn replace_trades(
        &self,
        report_id: i64,
        _key: &ReportKey,
        trades: &[CompletedTrade],
    ) -> Result<(), TradeStatsError> {
        self.state
            .borrow_mut()
            .trades
            .insert(report_id, trades.to_vec());
        Ok(())
    }

    fn replace_balance(
        &self,
        report_id: i64,
        _key: &ReportKey,
        samples: &[BalanceSample],
    ) -> Result<(), TradeStatsError> {
        if self.fail_balance {
            return Err(TradeStatsError::DatabaseQuery {
                reason: "mock balance failure".into(),
            });
        }
        self.state
            .borrow_mut()
            .balance
            .insert(report_id, samples.to_vec());
        Ok(())
    }

    fn report_id(&self, key: &ReportKey) -> Result<Option<i64>, TradeStatsError> {
        Ok(self.state.borrow().reports.get(key).map(|(id, _)| *id))
    }

    fn list_reports(&self) -> Result<Vec<StoredReport>, TradeStatsError> {
        let mut reports: Vec<StoredReport> = self
            .state
            .borrow()
            .reports
            .iter()
            .map(|(key, (id, summary))| StoredReport {
                id: *id,
                key: key.clone(),
                summary: summary.clone(),
            })
            .collect();
        reports.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(reports)
    }

    fn trades_for(&self, report_id: i64) -> Result<Vec<CompletedTrade>, TradeStatsError> {
        Ok(self
            .state
            .borrow()
            .trades
            .get(&report_id)
            .cloned()
            .unwrap_or_default())
    }

    fn balance_for(&self, report_id: i64) -> Result<Vec<BalanceSample>, TradeStatsError> {
        Ok(self
            .state
            .borrow()
            .balance
            .get(&report_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// One row of the deals table, in statement column order.
pub struct Deal<'a> {
    pub time: &'a str,
    pub deal: &'a str,
    pub deal_type: &'a str,
    pub direction: &'a str,
    pub price: &'a str,
    pub order: &'a str,
    pub commission: &'a str,
    pub profit: &'a str,
}

pub fn deal<'a>(
    time: &'a str,
    deal: &'a str,
    direction: &'a str,
    order: &'a str,
    price: &'a str,
    profit: &'a str,
) -> Deal<'a> {
    Deal {
        time,
        deal,
        deal_type: if direction == "in" { "buy" } else { "sell" },
        direction,
        price,
        order,
        commission: "-0.50",
        profit,
    }
}

pub fn deal_row(symbol: &str, d: &Deal<'_>) -> String {
    format!(
        "<tr><td>{}</td><td>{}</td><td>{symbol}</td><td>{}</td><td>{}</td><td>0.10</td>\
         <td>{}</td><td>{}</td><td>{}</td><td>0.00</td><td>{}</td><td>10 000.00</td>\
         <td></td></tr>",
        d.time, d.deal, d.deal_type, d.direction, d.price, d.order, d.commission, d.profit
    )
}

/// A statement with the summary labels the parser knows and a deals table.
pub fn statement_html(symbol: &str, deals: &[Deal<'_>]) -> String {
    let rows: String = deals.iter().map(|d| deal_row(symbol, d)).collect();
    format!(
        "<html><head><title>Strategy Tester Report</title></head><body>\
         <table>\
         <tr><td>Symbol:</td><td>{symbol}</td></tr>\
         <tr><td>Total Net Profit:</td><td>1 234.56</td>\
             <td>Balance Drawdown Absolute:</td><td>120.00</td>\
             <td>Equity Drawdown Absolute:</td><td>150.50</td></tr>\
         <tr><td>Balance Drawdown Maximal:</td><td>300.00 (2.95%)</td>\
             <td>Equity Drawdown Maximal:</td><td>320.10 (3.10%)</td></tr>\
         <tr><td>Balance Drawdown Relative:</td><td>2.95% (300.00)</td>\
             <td>Equity Drawdown Relative:</td><td>3.10% (320.10)</td></tr>\
         <tr><td>Total Trades:</td><td>40</td></tr>\
         <tr><td>Profit Trades (% of total):</td><td>26 (65.00%)</td>\
             <td>Loss Trades (% of total):</td><td>14 (35.00%)</td></tr>\
         <tr><td>Maximum consecutive wins ($):</td><td>6 (410.00)</td>\
             <td>Maximum consecutive losses ($):</td><td>3 (-150.00)</td></tr>\
         <tr><td>Average consecutive wins:</td><td>2</td>\
             <td>Average consecutive losses:</td><td>1</td></tr>\
         </table>\
         <table>\
         <tr><th colspan=\"13\">Deals</th></tr>\
         <tr><td>Time</td><td>Deal</td><td>Symbol</td><td>Type</td><td>Direction</td>\
             <td>Volume</td><td>Price</td><td>Order</td><td>Commission</td><td>Swap</td>\
             <td>Profit</td><td>Balance</td><td>Comment</td></tr>\
         {rows}\
         </table></body></html>"
    )
}

pub fn balance_csv(rows: &[(&str, &str, &str)]) -> String {
    let mut out = String::from("<DATE>\t<BALANCE>\t<EQUITY>\t<DEPOSIT LOAD>\n");
    for (date, balance, equity) in rows {
        out.push_str(&format!("{date}\t{balance}\t{equity}\t0.0000\n"));
    }
    out
}

/// UTF-16LE bytes with the FF FE marker, as MT5 writes its exports.
pub fn utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// Create `root/name` holding a statement and optionally a balance export.
pub fn write_report_dir(root: &Path, name: &str, statement: &[u8], balance: Option<&[u8]>) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("ReportTester-52011.html"), statement).unwrap();
    if let Some(bytes) = balance {
        fs::write(dir.join("Balance-52011.csv"), bytes).unwrap();
    }
}
