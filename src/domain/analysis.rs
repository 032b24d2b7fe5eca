//! Resolved run configuration.

use crate::domain::artifact::RunTag;
use crate::domain::interval::Interval;
use crate::domain::normalize::Normalization;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_LOCAL_WINDOW: usize = 25;
pub const DEFAULT_VOLATILITY_WINDOW: usize = 60;
pub const DEFAULT_BINS: usize = 100;
pub const DEFAULT_HISTOGRAM_RANGE: (f64, f64) = (-5.0, 5.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Csv,
    Sqlite,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Csv => write!(f, "csv"),
            DataSource::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "sqlite" => Ok(DataSource::Sqlite),
            other => Err(format!("unknown data source '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub tag: RunTag,
    pub tickers: Vec<String>,
    pub source: DataSource,
    /// Directory of `<ticker>.csv` files when `source` is csv.
    pub data_path: PathBuf,
    pub max_missing: usize,
    pub normalization: Normalization,
    pub volatility_window: usize,
    pub intervals: Vec<Interval>,
    /// Years to slice into periods. Empty means every year present in the data.
    pub years: Vec<i32>,
    /// Rows per business-day block; zero disables block correlations.
    pub block_size: usize,
    pub bins: usize,
    pub histogram_range: (f64, f64),
    pub output_path: PathBuf,
}

impl AnalysisConfig {
    pub fn blocks_enabled(&self) -> bool {
        self.block_size > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_parsing() {
        assert_eq!("CSV".parse::<DataSource>(), Ok(DataSource::Csv));
        assert_eq!(" sqlite ".parse::<DataSource>(), Ok(DataSource::Sqlite));
        assert!("postgres".parse::<DataSource>().is_err());
        assert_eq!(DataSource::Sqlite.to_string(), "sqlite");
    }
}
