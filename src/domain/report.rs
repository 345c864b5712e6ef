//! One statement parse feeding both the summary and the trade list.

use super::balance::{parse_balance_csv, BalanceSample};
use super::encoding::{decode, TextEncoding};
use super::ledger::{extract_ledger, reconcile, CompletedTrade};
use super::statement::{summary_from_labels, LabelTable, ReportSummary};
use scraper::Html;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    pub summary: ReportSummary,
    pub trades: Vec<CompletedTrade>,
}

impl ParsedStatement {
    /// Parse the HTML once and run both extractors over the same tree.
    pub fn from_html(html: &str) -> Self {
        let doc = Html::parse_document(html);
        Self {
            summary: summary_from_labels(&LabelTable::from_document(&doc)),
            trades: reconcile(extract_ledger(&doc)),
        }
    }

    /// Trades whose opening leg was found in the statement.
    pub fn closed_trades(&self) -> impl Iterator<Item = &CompletedTrade> {
        self.trades.iter().filter(|t| t.is_matched())
    }
}

/// Decoded statement plus what was parsed out of it.
#[derive(Debug, Clone)]
pub struct StatementFile {
    pub text: String,
    pub encoding: TextEncoding,
    pub parsed: ParsedStatement,
}

impl StatementFile {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let decoded = decode(bytes);
        let parsed = ParsedStatement::from_html(&decoded.text);
        Self {
            text: decoded.text,
            encoding: decoded.encoding,
            parsed,
        }
    }
}

/// Decode and parse a balance export.
pub fn balance_from_bytes(bytes: &[u8]) -> (Vec<BalanceSample>, TextEncoding) {
    let decoded = decode(bytes);
    (parse_balance_csv(&decoded.text), decoded.encoding)
}
