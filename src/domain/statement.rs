//! Summary statistics from an HTML strategy statement.
//!
//! The statement is a grid of label/value cell pairs. The document is walked
//! once to build a [`LabelTable`] mapping each known label to the text of the
//! cell next to it; every statistic is then read from that table. Labels that
//! are missing from the document leave their field as `None`.

use super::cell_text::{
    count_before_paren, decimal_value, element_text, integer_value, percent_value,
};
use super::labels::Instrument;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

static TD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid td selector"));
static INSTRUMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(US30|US100|XAU)").expect("valid instrument regex"));

/// The closed set of statement labels that are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementLabel {
    Symbol,
    TotalNetProfit,
    BalanceDrawdownAbsolute,
    EquityDrawdownAbsolute,
    BalanceDrawdownMaximal,
    EquityDrawdownMaximal,
    BalanceDrawdownRelative,
    EquityDrawdownRelative,
    TotalTrades,
    ProfitTrades,
    LossTrades,
    MaxConsecutiveWins,
    MaxConsecutiveLosses,
    AverageConsecutiveWins,
    AverageConsecutiveLosses,
}

impl StatementLabel {
    pub const ALL: [StatementLabel; 15] = [
        StatementLabel::Symbol,
        StatementLabel::TotalNetProfit,
        StatementLabel::BalanceDrawdownAbsolute,
        StatementLabel::EquityDrawdownAbsolute,
        StatementLabel::BalanceDrawdownMaximal,
        StatementLabel::EquityDrawdownMaximal,
        StatementLabel::BalanceDrawdownRelative,
        StatementLabel::EquityDrawdownRelative,
        StatementLabel::TotalTrades,
        StatementLabel::ProfitTrades,
        StatementLabel::LossTrades,
        StatementLabel::MaxConsecutiveWins,
        StatementLabel::MaxConsecutiveLosses,
        StatementLabel::AverageConsecutiveWins,
        StatementLabel::AverageConsecutiveLosses,
    ];

    /// Text of the label cell as printed in the statement.
    pub fn text(&self) -> &'static str {
        match self {
            StatementLabel::Symbol => "Symbol:",
            StatementLabel::TotalNetProfit => "Total Net Profit:",
            StatementLabel::BalanceDrawdownAbsolute => "Balance Drawdown Absolute:",
            StatementLabel::EquityDrawdownAbsolute => "Equity Drawdown Absolute:",
            StatementLabel::BalanceDrawdownMaximal => "Balance Drawdown Maximal:",
            StatementLabel::EquityDrawdownMaximal => "Equity Drawdown Maximal:",
            StatementLabel::BalanceDrawdownRelative => "Balance Drawdown Relative:",
            StatementLabel::EquityDrawdownRelative => "Equity Drawdown Relative:",
            StatementLabel::TotalTrades => "Total Trades:",
            StatementLabel::ProfitTrades => "Profit Trades (% of total):",
            StatementLabel::LossTrades => "Loss Trades (% of total):",
            StatementLabel::MaxConsecutiveWins => "Maximum consecutive wins ($):",
            StatementLabel::MaxConsecutiveLosses => "Maximum consecutive losses ($):",
            StatementLabel::AverageConsecutiveWins => "Average consecutive wins:",
            StatementLabel::AverageConsecutiveLosses => "Average consecutive losses:",
        }
    }
}

/// Label → adjacent cell text, built in one pass over the document.
#[derive(Debug, Default)]
pub struct LabelTable {
    values: HashMap<StatementLabel, String>,
}

impl LabelTable {
    pub fn from_document(doc: &Html) -> Self {
        let mut values = HashMap::new();

        for cell in doc.select(&TD_SELECTOR) {
            if values.len() == StatementLabel::ALL.len() {
                break;
            }
            // Wrapper cells repeat the text of the cells they contain.
            if has_nested_cell(cell) {
                continue;
            }
            let text = element_text(cell);
            if text.is_empty() {
                continue;
            }
            for label in StatementLabel::ALL {
                if values.contains_key(&label) || !text.contains(label.text()) {
                    continue;
                }
                let value = next_element(cell).map(element_text).unwrap_or_default();
                values.insert(label, value);
            }
        }

        Self { values }
    }

    pub fn get(&self, label: StatementLabel) -> Option<&str> {
        self.values.get(&label).map(String::as_str)
    }

    fn percent(&self, label: StatementLabel) -> Option<f64> {
        self.get(label).and_then(percent_value)
    }

    fn decimal(&self, label: StatementLabel) -> Option<f64> {
        self.get(label).and_then(decimal_value)
    }

    fn integer(&self, label: StatementLabel) -> Option<i64> {
        self.get(label).and_then(integer_value)
    }
}

fn has_nested_cell(cell: ElementRef<'_>) -> bool {
    cell.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().name() == "td")
}

fn next_element(cell: ElementRef<'_>) -> Option<ElementRef<'_>> {
    cell.next_siblings().find_map(ElementRef::wrap)
}

/// Headline statistics of one strategy run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub instrument: Option<Instrument>,
    pub net_profit: Option<f64>,
    pub balance_drawdown_absolute: Option<f64>,
    pub equity_drawdown_absolute: Option<f64>,
    pub balance_drawdown_maximal: Option<f64>,
    pub equity_drawdown_maximal: Option<f64>,
    pub balance_drawdown_relative: Option<f64>,
    pub equity_drawdown_relative: Option<f64>,
    pub total_trades: Option<i64>,
    pub profitable_trades: Option<i64>,
    pub win_rate: Option<f64>,
    pub loss_rate: Option<f64>,
    pub max_consecutive_wins: Option<i64>,
    pub max_consecutive_losses: Option<i64>,
    pub avg_consecutive_wins: Option<f64>,
    pub avg_consecutive_losses: Option<f64>,
}

/// Find the first supported ticker in free text (case-insensitive).
pub fn detect_instrument_in(text: &str) -> Option<Instrument> {
    let found = INSTRUMENT_RE.captures(text)?.get(1)?.as_str().to_lowercase();
    found.parse().ok()
}

/// Parse the summary statistics of a decoded HTML statement.
pub fn parse_statement(html: &str) -> ReportSummary {
    let doc = Html::parse_document(html);
    summary_from_labels(&LabelTable::from_document(&doc))
}

pub fn summary_from_labels(table: &LabelTable) -> ReportSummary {
    use StatementLabel as L;

    let profit_trades = table.get(L::ProfitTrades);

    ReportSummary {
        instrument: table.get(L::Symbol).and_then(detect_instrument_in),
        net_profit: table.decimal(L::TotalNetProfit),
        balance_drawdown_absolute: table.decimal(L::BalanceDrawdownAbsolute),
        equity_drawdown_absolute: table.decimal(L::EquityDrawdownAbsolute),
        balance_drawdown_maximal: table.decimal(L::BalanceDrawdownMaximal),
        equity_drawdown_maximal: table.decimal(L::EquityDrawdownMaximal),
        balance_drawdown_relative: table.percent(L::BalanceDrawdownRelative),
        equity_drawdown_relative: table.percent(L::EquityDrawdownRelative),
        total_trades: table.integer(L::TotalTrades),
        profitable_trades: profit_trades.and_then(count_before_paren),
        win_rate: profit_trades.and_then(percent_value),
        loss_rate: table.percent(L::LossTrades),
        max_consecutive_wins: table.integer(L::MaxConsecutiveWins),
        max_consecutive_losses: table.integer(L::MaxConsecutiveLosses),
        avg_consecutive_wins: table.decimal(L::AverageConsecutiveWins),
        avg_consecutive_losses: table.decimal(L::AverageConsecutiveLosses),
    }
}
