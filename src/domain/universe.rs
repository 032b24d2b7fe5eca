//! Ticker universe and price matrix assembly.
//!
//! Parses ticker lists from configuration, fetches each ticker's prices
//! through a [`DataPort`], and aligns them into a single dates × tickers
//! matrix. Tickers with too many gaps are dropped and the remaining gaps are
//! forward-filled.

use crate::domain::error::CorrError;
use crate::domain::frame::TimeFrame;
use crate::domain::price::TickerSeries;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

/// Default number of missing observations a ticker may have before it is dropped.
pub const MAX_MISSING_OBSERVATIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let ticker = token.trim();
        if ticker.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if !seen.insert(ticker.to_string()) {
            return Err(UniverseError::DuplicateTicker(ticker.to_string()));
        }
        tickers.push(ticker.to_string());
    }

    Ok(tickers)
}

#[derive(Debug, Clone)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: String,
}

pub struct UniverseLoad {
    pub series: Vec<TickerSeries>,
    pub skipped: Vec<SkippedTicker>,
}

/// Fetches every ticker, skipping the ones that fail or have no prices.
pub fn load_universe(
    data_port: &dyn DataPort,
    tickers: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<UniverseLoad, CorrError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for ticker in tickers {
        let points = match data_port.fetch_prices(ticker, start_date, end_date) {
            Ok(points) => points,
            Err(e) => {
                warn!(%ticker, error = %e, "skipping ticker");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if points.is_empty() {
            warn!(%ticker, "skipping ticker (no prices in range)");
            skipped.push(SkippedTicker {
                ticker: ticker.clone(),
                reason: "no prices in range".into(),
            });
            continue;
        }

        series.push(TickerSeries::new(ticker.clone(), points));
    }

    if series.is_empty() {
        return Err(CorrError::NoData {
            ticker: tickers.join(","),
        });
    }

    info!(
        loaded = series.len(),
        skipped = skipped.len(),
        "universe loaded"
    );
    Ok(UniverseLoad { series, skipped })
}

/// Aligns every series on the union of their dates. Absent observations are `NaN`.
pub fn build_price_matrix(series: &[TickerSeries]) -> Result<TimeFrame, CorrError> {
    let timeline: Vec<NaiveDate> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let row_of: HashMap<NaiveDate, usize> = timeline
        .iter()
        .enumerate()
        .map(|(i, d)| (*d, i))
        .collect();

    let mut values = Vec::with_capacity(series.len());
    for s in series {
        let mut column = vec![f64::NAN; timeline.len()];
        for point in &s.points {
            column[row_of[&point.date]] = point.close;
        }
        values.push(column);
    }

    TimeFrame::new(
        timeline,
        series.iter().map(|s| s.ticker.clone()).collect(),
        values,
    )
}

/// Result of dropping sparse tickers and filling gaps.
pub struct CleanedPrices {
    pub prices: TimeFrame,
    pub dropped: Vec<String>,
}

/// Drops tickers with more than `max_missing` gaps, then forward-fills the rest.
pub fn clean_price_matrix(prices: &TimeFrame, max_missing: usize) -> CleanedPrices {
    let missing = prices.missing_counts();
    let mut columns = Vec::new();
    let mut values = Vec::new();
    let mut dropped = Vec::new();

    for (i, name) in prices.columns.iter().enumerate() {
        if missing[i] > max_missing {
            warn!(
                ticker = %name,
                missing = missing[i],
                max_missing,
                "dropping ticker with too many missing prices"
            );
            dropped.push(name.clone());
            continue;
        }
        columns.push(name.clone());
        values.push(forward_fill(prices.column(i)));
    }

    CleanedPrices {
        prices: TimeFrame {
            dates: prices.dates.clone(),
            columns,
            values,
        },
        dropped,
    }
}

/// Carries the last finite value forward. Leading gaps stay missing.
pub fn forward_fill(column: &[f64]) -> Vec<f64> {
    let mut last = f64::NAN;
    column
        .iter()
        .map(|&v| {
            if v.is_finite() {
                last = v;
            }
            last
        })
        .collect()
}
