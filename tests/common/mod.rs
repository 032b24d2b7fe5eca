#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use retcorr::domain::analysis::{AnalysisConfig, DataSource};
use retcorr::domain::artifact::RunTag;
use retcorr::domain::error::CorrError;
use retcorr::domain::interval::Interval;
use retcorr::domain::normalize::Normalization;
pub use retcorr::domain::price::PricePoint;
use retcorr::ports::data_port::DataPort;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, ticker: &str, points: Vec<PricePoint>) -> Self {
        self.data.insert(ticker.to_string(), points);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, CorrError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(CorrError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.date >= start_date && p.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, CorrError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CorrError> {
        match self.data.get(ticker) {
            Some(points) if !points.is_empty() => {
                let min = points.iter().map(|p| p.date).min().unwrap();
                let max = points.iter().map(|p| p.date).max().unwrap();
                Ok(Some((min, max, points.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Deterministic daily price path from 100 with returns mixing a shared
/// factor and a ticker-specific oscillation selected by `seed`.
pub fn generate_prices(start: NaiveDate, count: usize, seed: u32) -> Vec<PricePoint> {
    let s = seed as f64 + 1.0;
    let mut price = 100.0 * s;
    (0..count)
        .map(|i| {
            let t = i as f64;
            let common = 0.004 * (t * 0.173).sin();
            let own = 0.006 * (t * (0.31 + 0.11 * s) + s).sin() + 0.003 * (t * 1.37 * s).cos();
            if i > 0 {
                price *= 1.0 + common + own;
            }
            PricePoint::new(start + Days::new(i as u64), price)
        })
        .collect()
}

pub fn analysis_config(tickers: &[&str], output: PathBuf) -> AnalysisConfig {
    AnalysisConfig {
        tag: RunTag::new(date(2019, 1, 1), date(2020, 12, 31), "1d"),
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        source: DataSource::Csv,
        data_path: PathBuf::from("data"),
        max_missing: 10,
        normalization: Normalization::Global,
        volatility_window: 20,
        intervals: vec![Interval::Month, Interval::Quarter],
        years: vec![],
        block_size: 0,
        bins: 40,
        histogram_range: (-5.0, 5.0),
        output_path: output,
    }
}

/// Writes `<ticker>.csv` with `date,close` rows.
pub fn write_price_csv(dir: &std::path::Path, ticker: &str, points: &[PricePoint]) {
    let mut content = String::from("date,close\n");
    for p in points {
        content.push_str(&format!("{},{}\n", p.date.format("%Y-%m-%d"), p.close));
    }
    std::fs::write(dir.join(format!("{}.csv", ticker)), content).unwrap();
}
