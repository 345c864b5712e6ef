//! Instrument, schedule and report-key vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tickers the reports are produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Us30,
    Us100,
    Xau,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::Us30, Instrument::Us100, Instrument::Xau];

    pub fn code(&self) -> &'static str {
        match self {
            Instrument::Us30 => "us30",
            Instrument::Us100 => "us100",
            Instrument::Xau => "xau",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Instrument::ALL
            .into_iter()
            .find(|i| i.code() == lower)
            .ok_or_else(|| format!("unknown instrument '{s}' (expected us30, us100 or xau)"))
    }
}

/// Trading-window configuration of a strategy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Schedule {
    #[serde(rename = "Daily")]
    Daily,
    #[serde(rename = "Daily + London")]
    DailyLondon,
}

impl Schedule {
    pub const ALL: [Schedule; 2] = [Schedule::Daily, Schedule::DailyLondon];

    pub fn label(&self) -> &'static str {
        match self {
            Schedule::Daily => "Daily",
            Schedule::DailyLondon => "Daily + London",
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Schedule {
    type Err = String;

    /// Accepts the stored label ("Daily + London") as well as compact CLI
    /// spellings ("daily+london", "daily-london").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match compact.as_str() {
            "daily" => Ok(Schedule::Daily),
            "daily+london" | "daily-london" | "dailylondon" => Ok(Schedule::DailyLondon),
            _ => Err(format!("unknown schedule '{s}' (expected Daily or Daily + London)")),
        }
    }
}

/// Identity of one stored report: the conflict key for upserts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportKey {
    pub instrument: Instrument,
    pub schedule: Schedule,
    pub agent: String,
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.instrument, self.schedule, self.agent)
    }
}
