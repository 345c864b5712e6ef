//! Deal-ledger extraction and in/out leg reconciliation.
//!
//! Rows come from the statement table headed "Deals". Opening (`in`) legs are
//! held by order id until a closing (`out`) leg with the same order id turns
//! them into a [`CompletedTrade`]. Opening legs that never close are dropped.

use super::cell_text::{element_text, parse_compact_f64};
use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

static TH_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("valid th selector"));

const DEALS_HEADER: &str = "Deals";
const BALANCE_TYPE: &str = "balance";
const LEDGER_COLUMNS: usize = 13;
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y.%m.%d %H:%M:%S", "%Y.%m.%d %H:%M"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Other(String),
}

impl Direction {
    pub fn parse(text: &str) -> Self {
        match text {
            "in" => Direction::In,
            "out" => Direction::Out,
            other => Direction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Other(s) => s,
        }
    }
}

/// One raw row of the deals table.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub time: NaiveDateTime,
    pub deal_number: i64,
    pub symbol: String,
    pub deal_type: String,
    pub direction: Direction,
    pub volume: f64,
    pub price: f64,
    pub order: String,
    pub commission: f64,
    pub swap: f64,
    pub profit: f64,
    pub balance: f64,
    pub comment: String,
}

/// A closing leg together with the opening leg it settled, if one was seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTrade {
    pub deal_number: i64,
    pub time: NaiveDateTime,
    pub symbol: String,
    #[serde(rename = "type")]
    pub deal_type: String,
    pub direction: String,
    pub volume: f64,
    pub in_price: Option<f64>,
    pub out_price: Option<f64>,
    pub profit: f64,
    pub commission: f64,
    pub swap: f64,
    pub balance: f64,
    pub comment: String,
}

impl CompletedTrade {
    /// Both legs were present in the statement.
    pub fn is_matched(&self) -> bool {
        self.in_price.is_some() && self.out_price.is_some()
    }
}

pub fn parse_ledger_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

fn direct_children<'a>(
    element: ElementRef<'a>,
    name: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.value().name() == name)
}

/// Rows of a table, looking through the implicit `tbody`/`thead` wrappers but
/// not into nested tables.
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(direct_children(child, "tr")),
            _ => {}
        }
    }
    rows
}

fn enclosing<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == name)
}

/// Parse one row; `None` marks it malformed.
fn entry_from_row(row: ElementRef<'_>) -> Option<LedgerEntry> {
    let cells: Vec<String> = direct_children(row, "td").map(element_text).collect();
    if cells.len() < LEDGER_COLUMNS {
        return None;
    }

    let time = parse_ledger_time(&cells[0])?;
    let deal_number = cells[1].trim().parse::<i64>().ok()?;
    let price = parse_compact_f64(&cells[6])?;
    let amount = |idx: usize| parse_compact_f64(&cells[idx]).unwrap_or(0.0);

    Some(LedgerEntry {
        time,
        deal_number,
        symbol: cells[2].clone(),
        deal_type: cells[3].clone(),
        direction: Direction::parse(&cells[4]),
        volume: amount(5),
        price,
        order: cells[7].clone(),
        commission: amount(8),
        swap: amount(9),
        profit: amount(10),
        balance: amount(11),
        comment: cells[12].clone(),
    })
}

/// Extract every trade row of the "Deals" table in document order.
///
/// Balance adjustments and malformed rows are skipped. A statement without a
/// deals table yields an empty list.
pub fn extract_ledger(doc: &Html) -> Vec<LedgerEntry> {
    let Some(header) = doc
        .select(&TH_SELECTOR)
        .find(|th| element_text(*th).contains(DEALS_HEADER))
    else {
        return Vec::new();
    };
    let Some(table) = enclosing(header, "table") else {
        return Vec::new();
    };

    let rows = table_rows(table);
    let header_row = enclosing(header, "tr");
    // Start after the row carrying the "Deals" header, so any section that
    // shares the table before it is left out.
    let start = header_row
        .and_then(|hr| rows.iter().position(|r| r.id() == hr.id()))
        .map_or(1, |pos| pos + 1);

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for row in rows.into_iter().skip(start) {
        match entry_from_row(row) {
            Some(entry) if entry.deal_type == BALANCE_TYPE => {}
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "skipped malformed deal rows");
    }
    entries
}

/// Fold state pairing opening legs with closing legs by order id.
#[derive(Debug, Default)]
pub struct Reconciler {
    open: HashMap<String, LedgerEntry>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one ledger row; returns the trade it completes, if any.
    pub fn step(&mut self, entry: LedgerEntry) -> Option<CompletedTrade> {
        match entry.direction {
            Direction::In => {
                self.open.insert(entry.order.clone(), entry);
                None
            }
            Direction::Out => Some(match self.open.remove(&entry.order) {
                Some(opening) => close_trade(&entry, Some(&opening)),
                None => close_trade(&entry, None),
            }),
            Direction::Other(_) => None,
        }
    }

    /// Opening legs still waiting for a close.
    pub fn pending(&self) -> usize {
        self.open.len()
    }
}

fn close_trade(closing: &LedgerEntry, opening: Option<&LedgerEntry>) -> CompletedTrade {
    let (in_price, commission, swap) = match opening {
        Some(open) => (
            Some(open.price),
            closing.commission + open.commission,
            closing.swap + open.swap,
        ),
        None => (None, closing.commission, closing.swap),
    };

    CompletedTrade {
        deal_number: closing.deal_number,
        time: closing.time,
        symbol: closing.symbol.clone(),
        deal_type: closing.deal_type.clone(),
        direction: closing.direction.as_str().to_string(),
        volume: closing.volume,
        in_price,
        out_price: Some(closing.price),
        profit: closing.profit,
        commission,
        swap,
        balance: closing.balance,
        comment: closing.comment.clone(),
    }
}

/// Pair ledger rows into trades, in the order the trades close.
pub fn reconcile<I>(entries: I) -> Vec<CompletedTrade>
where
    I: IntoIterator<Item = LedgerEntry>,
{
    let mut reconciler = Reconciler::new();
    let trades: Vec<CompletedTrade> = entries
        .into_iter()
        .filter_map(|entry| reconciler.step(entry))
        .collect();
    if reconciler.pending() > 0 {
        debug!(
            pending = reconciler.pending(),
            "opening legs without a closing deal were dropped"
        );
    }
    trades
}

/// Extract and reconcile the trades of a decoded HTML statement.
pub fn parse_trades(html: &str) -> Vec<CompletedTrade> {
    let doc = Html::parse_document(html);
    reconcile(extract_ledger(&doc))
}
