//! Analysis stages.
//!
//! Each stage reads its predecessor's artifact from the [`ArtifactStore`],
//! computes, and writes its own artifacts. A stage whose input has not been
//! produced yet is skipped with a warning rather than failing the run, as is
//! a pairwise stage over a universe of fewer than two instruments. Any other
//! error propagates.
//!
//! ```text
//! prices -> returns -> volatility
//!                   -> normalized -> per-instrument densities
//!                                 -> correlation
//!                                 -> interval correlations
//!                                 -> block correlations
//!                                 -> aggregated distribution
//! ```

use crate::domain::aggregate::aggregate_pairs;
use crate::domain::analysis::AnalysisConfig;
use crate::domain::artifact::ArtifactKey;
use crate::domain::correlation::correlation_matrix;
use crate::domain::distribution::{compare_to_gaussian, moments};
use crate::domain::error::CorrError;
use crate::domain::frame::TimeFrame;
use crate::domain::interval::{Interval, block_correlations, interval_correlations, years_in};
use crate::domain::normalize::{Normalization, normalize};
use crate::domain::returns::compute_returns;
use crate::domain::rolling::volatility;
use crate::domain::universe::{build_price_matrix, clean_price_matrix, load_universe};
use crate::ports::artifact_port::ArtifactStore;
use crate::ports::data_port::DataPort;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Written(Vec<PathBuf>),
    Skipped { reason: String },
}

impl StageOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped { .. })
    }

    pub fn paths(&self) -> &[PathBuf] {
        match self {
            StageOutcome::Written(paths) => paths,
            StageOutcome::Skipped { .. } => &[],
        }
    }
}

/// Turns a missing input artifact into a skipped stage.
fn skip_if_missing(stage: &str, err: CorrError) -> Result<StageOutcome, CorrError> {
    if err.is_missing_artifact() {
        warn!(stage, error = %err, "input not available, skipping stage");
        Ok(StageOutcome::Skipped {
            reason: err.to_string(),
        })
    } else {
        Err(err)
    }
}

/// Pairwise stages need two instruments; a narrower universe skips them.
fn skip_if_single(stage: &str, frame: &TimeFrame) -> Option<StageOutcome> {
    let found = frame.n_cols();
    if found >= 2 {
        return None;
    }
    let err = CorrError::InsufficientColumns { needed: 2, found };
    warn!(stage, error = %err, "not enough instruments, skipping stage");
    Some(StageOutcome::Skipped {
        reason: err.to_string(),
    })
}

pub fn prices_stage(
    data_port: &dyn DataPort,
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
) -> Result<StageOutcome, CorrError> {
    let universe = load_universe(data_port, &config.tickers, config.tag.start, config.tag.end)?;
    let raw = build_price_matrix(&universe.series)?;
    let cleaned = clean_price_matrix(&raw, config.max_missing);

    if cleaned.prices.n_cols() == 0 {
        return Err(CorrError::NoData {
            ticker: config.tickers.join(","),
        });
    }

    info!(
        tickers = cleaned.prices.n_cols(),
        rows = cleaned.prices.n_rows(),
        "price matrix built"
    );
    let path = store.save_frame(&ArtifactKey::prices(&config.tag), &cleaned.prices)?;
    Ok(StageOutcome::Written(vec![path]))
}

pub fn returns_stage(
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
) -> Result<StageOutcome, CorrError> {
    let prices = match store.load_frame(&ArtifactKey::prices(&config.tag)) {
        Ok(frame) => frame,
        Err(e) => return skip_if_missing("returns", e),
    };

    let returns = compute_returns(&prices);
    if returns.is_empty() {
        warn!("no complete return rows");
    }
    info!(rows = returns.n_rows(), "returns computed");
    let path = store.save_frame(&ArtifactKey::returns(&config.tag), &returns)?;
    Ok(StageOutcome::Written(vec![path]))
}

pub fn volatility_stage(
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
    window: usize,
) -> Result<StageOutcome, CorrError> {
    let returns = match store.load_frame(&ArtifactKey::returns(&config.tag)) {
        Ok(frame) => frame,
        Err(e) => return skip_if_missing("volatility", e),
    };

    let vol = volatility(&returns, window)?;
    info!(window, rows = vol.n_rows(), "rolling volatility computed");
    let path = store.save_frame(&ArtifactKey::volatility(&config.tag, window), &vol)?;
    Ok(StageOutcome::Written(vec![path]))
}

pub fn normalize_stage(
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
    norm: &Normalization,
) -> Result<StageOutcome, CorrError> {
    let returns = match store.load_frame(&ArtifactKey::returns(&config.tag)) {
        Ok(frame) => frame,
        Err(e) => return skip_if_missing("normalize", e),
    };

    let normalized = normalize(&returns, norm)?;
    info!(normalization = %norm, rows = normalized.n_rows(), "returns normalized");
    let path = store.save_frame(&ArtifactKey::normalized(&config.tag, norm), &normalized)?;
    Ok(StageOutcome::Written(vec![path]))
}

/// Compares each instrument's normalized returns with N(0, 1).
pub fn return_density_stage(
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
    norm: &Normalization,
) -> Result<StageOutcome, CorrError> {
    let normalized = match load_normalized(store, config, norm) {
        Ok(frame) => frame,
        Err(e) => return skip_if_missing("densities", e),
    };

    let mut paths = Vec::with_capacity(normalized.n_cols());
    for (index, column) in normalized.columns.iter().enumerate() {
        let values: Vec<f64> = normalized
            .column(index)
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if let Some(m) = moments(&values) {
            info!(
                column = %column,
                skewness = m.skewness,
                excess_kurtosis = m.excess_kurtosis,
                "return distribution moments"
            );
        }
        let rows = compare_to_gaussian(&values, config.bins, config.histogram_range)?;
        let key = ArtifactKey::return_density(&config.tag, norm, column);
        paths.push(store.save_density(&key, &rows)?);
    }
    Ok(StageOutcome::Written(paths))
}

fn load_normalized(
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
    norm: &Normalization,
) -> Result<TimeFrame, CorrError> {
    store.load_frame(&ArtifactKey::normalized(&config.tag, norm))
}

pub fn correlation_stage(
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
    norm: &Normalization,
) -> Result<StageOutcome, CorrError> {
    let normalized = match load_normalized(store, config, norm) {
        Ok(frame) => frame,
        Err(e) => return skip_if_missing("correlation", e),
    };
    if let Some(skipped) = skip_if_single("correlation", &normalized) {
        return Ok(skipped);
    }

    let matrix = correlation_matrix(&normalized)?;
    info!(
        size = matrix.size(),
        mean_off_diagonal = matrix.mean_off_diagonal().unwrap_or(f64::NAN),
        "correlation matrix computed"
    );
    let path = store.save_correlation(&ArtifactKey::correlation(&config.tag, norm), &matrix)?;
    Ok(StageOutcome::Written(vec![path]))
}

/// Correlation per calendar period for every requested year and interval.
///
/// An empty `years` slice means every year present in the normalized data.
pub fn interval_correlation_stage(
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
    norm: &Normalization,
    intervals: &[Interval],
    years: &[i32],
) -> Result<StageOutcome, CorrError> {
    let normalized = match load_normalized(store, config, norm) {
        Ok(frame) => frame,
        Err(e) => return skip_if_missing("intervals", e),
    };
    if let Some(skipped) = skip_if_single("intervals", &normalized) {
        return Ok(skipped);
    }

    let years = if years.is_empty() {
        years_in(&normalized)
    } else {
        years.to_vec()
    };

    let mut paths = Vec::new();
    for &year in &years {
        for &interval in intervals {
            let periods = interval_correlations(&normalized, year, interval)?;
            let populated = periods.iter().filter(|p| p.observations >= 2).count();
            for pc in &periods {
                let key = ArtifactKey::period_correlation(&config.tag, norm, year, interval, &pc.period);
                paths.push(store.save_correlation(&key, &pc.matrix)?);
            }
            info!(year, %interval, periods = periods.len(), populated, "interval correlations written");
        }
    }
    Ok(StageOutcome::Written(paths))
}

pub fn block_correlation_stage(
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
    norm: &Normalization,
    block: usize,
) -> Result<StageOutcome, CorrError> {
    let normalized = match load_normalized(store, config, norm) {
        Ok(frame) => frame,
        Err(e) => return skip_if_missing("blocks", e),
    };
    if let Some(skipped) = skip_if_single("blocks", &normalized) {
        return Ok(skipped);
    }

    let blocks = block_correlations(&normalized, block)?;
    let mut paths = Vec::with_capacity(blocks.len());
    for bc in &blocks {
        let key = ArtifactKey::block_correlation(&config.tag, norm, block, bc.index);
        paths.push(store.save_correlation(&key, &bc.matrix)?);
    }
    info!(block, blocks = blocks.len(), "block correlations written");
    Ok(StageOutcome::Written(paths))
}

/// Whitens every pair, pools the result, and compares its density with N(0, 1).
pub fn aggregate_stage(
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
    norm: &Normalization,
) -> Result<StageOutcome, CorrError> {
    let normalized = match load_normalized(store, config, norm) {
        Ok(frame) => frame,
        Err(e) => return skip_if_missing("aggregate", e),
    };
    if let Some(skipped) = skip_if_single("aggregate", &normalized) {
        return Ok(skipped);
    }

    let dist = aggregate_pairs(&normalized)?;
    info!(
        pairs = dist.pairs_used.len(),
        skipped = dist.pairs_skipped.len(),
        samples = dist.len(),
        "pairs whitened"
    );
    if let Some(m) = moments(&dist.values) {
        info!(
            mean = m.mean,
            variance = m.variance,
            skewness = m.skewness,
            excess_kurtosis = m.excess_kurtosis,
            "aggregated distribution moments"
        );
    }

    let sample_path = store.save_sample(&ArtifactKey::aggregated(&config.tag, norm), &dist.values)?;
    let rows = compare_to_gaussian(&dist.values, config.bins, config.histogram_range)?;
    let density_path = store.save_density(&ArtifactKey::density(&config.tag, norm), &rows)?;
    Ok(StageOutcome::Written(vec![sample_path, density_path]))
}

/// Runs every stage in order with the configured parameters.
pub fn run_all(
    data_port: &dyn DataPort,
    store: &dyn ArtifactStore,
    config: &AnalysisConfig,
) -> Result<Vec<(&'static str, StageOutcome)>, CorrError> {
    let norm = config.normalization;
    let mut outcomes = vec![
        ("prices", prices_stage(data_port, store, config)?),
        ("returns", returns_stage(store, config)?),
        ("volatility", volatility_stage(store, config, config.volatility_window)?),
        ("normalize", normalize_stage(store, config, &norm)?),
        ("densities", return_density_stage(store, config, &norm)?),
        ("correlation", correlation_stage(store, config, &norm)?),
        (
            "intervals",
            interval_correlation_stage(store, config, &norm, &config.intervals, &config.years)?,
        ),
    ];
    if config.blocks_enabled() {
        outcomes.push((
            "blocks",
            block_correlation_stage(store, config, &norm, config.block_size)?,
        ));
    }
    outcomes.push(("aggregate", aggregate_stage(store, config, &norm)?));
    Ok(outcomes)
}
