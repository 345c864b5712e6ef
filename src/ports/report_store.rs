//! Persistence port for parsed reports.

use crate::domain::balance::BalanceSample;
use crate::domain::error::TradeStatsError;
use crate::domain::labels::ReportKey;
use crate::domain::ledger::CompletedTrade;
use crate::domain::rollup::StoredReport;
use crate::domain::statement::ReportSummary;

/// Storage for report summaries and the trades and balance samples they own.
///
/// Child collections are always replaced wholesale: implementations delete
/// every row of the report and insert the new set inside one transaction.
pub trait ReportStore {
    fn initialize_schema(&self) -> Result<(), TradeStatsError>;

    /// Insert or overwrite the summary for `key`, returning its id.
    fn upsert_report(&self, key: &ReportKey, summary: &ReportSummary)
    -> Result<i64, TradeStatsError>;

    fn replace_trades(
        &self,
        report_id: i64,
        key: &ReportKey,
        trades: &[CompletedTrade],
    ) -> Result<(), TradeStatsError>;

    fn replace_balance(
        &self,
        report_id: i64,
        key: &ReportKey,
        samples: &[BalanceSample],
    ) -> Result<(), TradeStatsError>;

    fn report_id(&self, key: &ReportKey) -> Result<Option<i64>, TradeStatsError>;

    fn list_reports(&self) -> Result<Vec<StoredReport>, TradeStatsError>;

    /// Trades of a report in close order.
    fn trades_for(&self, report_id: i64) -> Result<Vec<CompletedTrade>, TradeStatsError>;

    /// Balance samples of a report in time order.
    fn balance_for(&self, report_id: i64) -> Result<Vec<BalanceSample>, TradeStatsError>;
}
