//! Report labels inferred from directory names and statement text.
//!
//! Report folders are named after the run they hold, e.g.
//! "US30 Daily + London (Cyberspace)". When a statement does not carry a
//! recognisable symbol the folder name fills in.

use super::labels::{Instrument, Schedule};

pub const CYBERSPACE_AGENT: &str = "Cyberspace EA";
pub const BREAKOUT_AGENT: &str = "Breakout EA by currency pro";

pub fn detect_instrument(name: &str) -> Option<Instrument> {
    let lower = name.to_lowercase();
    if lower.contains("us30") {
        Some(Instrument::Us30)
    } else if lower.contains("us100") {
        Some(Instrument::Us100)
    } else if lower.contains("xau") {
        Some(Instrument::Xau)
    } else {
        None
    }
}

pub fn detect_schedule(name: &str) -> Option<Schedule> {
    let lower = name.to_lowercase();
    if lower.contains("daily + london") || lower.contains("daily+london") {
        Some(Schedule::DailyLondon)
    } else if lower.contains("daily") {
        Some(Schedule::Daily)
    } else {
        None
    }
}

fn agent_in(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if lower.contains("cyber") {
        Some(CYBERSPACE_AGENT)
    } else if lower.contains("breakout") {
        Some(BREAKOUT_AGENT)
    } else {
        None
    }
}

/// Agent name from the directory name, then the statement text, then `default`.
pub fn detect_agent(name: &str, statement_text: Option<&str>, default: &str) -> String {
    agent_in(name)
        .or_else(|| statement_text.and_then(agent_in))
        .map_or_else(|| default.to_string(), str::to_string)
}
