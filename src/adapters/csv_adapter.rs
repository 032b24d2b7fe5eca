//! CSV file price adapter.
//!
//! One `<ticker>.csv` file per instrument with a header row. The `date`
//! column (YYYY-MM-DD) is required, and prices come from `adj_close` when
//! present, otherwise `close`. Rows with a blank price are skipped.

use crate::domain::error::CorrError;
use crate::domain::price::PricePoint;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    fn read_all(&self, ticker: &str) -> Result<Vec<PricePoint>, CorrError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| CorrError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| CorrError::Data {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .clone();

        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let date_col = find("date").ok_or_else(|| CorrError::Data {
            reason: format!("missing date column in {}", path.display()),
        })?;
        let price_col = find("adj_close")
            .or_else(|| find("close"))
            .ok_or_else(|| CorrError::Data {
                reason: format!("missing close column in {}", path.display()),
            })?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| CorrError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(date_col).unwrap_or("").trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                CorrError::Data {
                    reason: format!("invalid date '{}': {}", date_str, e),
                }
            })?;

            let price_str = record.get(price_col).unwrap_or("").trim();
            if price_str.is_empty() {
                continue;
            }
            let close: f64 = price_str.parse().map_err(|e| CorrError::Data {
                reason: format!("invalid price '{}': {}", price_str, e),
            })?;

            points.push(PricePoint { date, close });
        }

        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, CorrError> {
        Ok(self
            .read_all(ticker)?
            .into_iter()
            .filter(|p| p.date >= start_date && p.date <= end_date)
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, CorrError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| CorrError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CorrError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(ticker) = name_str.strip_suffix(".csv") {
                symbols.push(ticker.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CorrError> {
        if !self.csv_path(ticker).exists() {
            return Ok(None);
        }
        let points = self.read_all(ticker)?;
        Ok(match (points.first(), points.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, points.len())),
            _ => None,
        })
    }
}
