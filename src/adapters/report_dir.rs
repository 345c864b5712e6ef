//! Report folders on disk: one strategy run per subdirectory, holding an HTML
//! statement and optionally a balance CSV.

use crate::domain::error::TradeStatsError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDirectory {
    pub name: String,
    pub path: PathBuf,
}

impl ReportDirectory {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }

    /// Non-hidden subdirectories of `root`, sorted by name.
    pub fn scan(root: &Path) -> Result<Vec<ReportDirectory>, TradeStatsError> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir = ReportDirectory::new(entry.path());
            if dir.name.starts_with('.') {
                continue;
            }
            dirs.push(dir);
        }
        dirs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(dirs)
    }

    fn find_file(&self, extension: &str, marker: &str) -> Result<Option<PathBuf>, TradeStatsError> {
        let marker = marker.to_lowercase();
        let mut matches = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if name.ends_with(extension) && name.contains(&marker) {
                matches.push(entry.path());
            }
        }
        matches.sort();
        Ok(matches.into_iter().next())
    }

    /// First `.html` file whose name contains `marker` (case-insensitive).
    pub fn statement_file(&self, marker: &str) -> Result<Option<PathBuf>, TradeStatsError> {
        self.find_file(".html", marker)
    }

    /// First `.csv` file whose name contains `marker` (case-insensitive).
    pub fn balance_file(&self, marker: &str) -> Result<Option<PathBuf>, TradeStatsError> {
        self.find_file(".csv", marker)
    }
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>, TradeStatsError> {
    Ok(fs::read(path)?)
}
