//! tradestats: MT5 strategy-tester report ingestion.
//!
//! Hexagonal architecture: parsing and reconciliation in [`domain`], port
//! traits in [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
pub mod logging;
