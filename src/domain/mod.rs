//! Core domain types and logic: decoding, parsing, reconciliation, rollups.

pub mod encoding;
pub mod cell_text;
pub mod labels;
pub mod statement;
pub mod ledger;
pub mod balance;
pub mod report;
pub mod naming;
pub mod rollup;
pub mod config_validation;
pub mod error;
