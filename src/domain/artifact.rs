//! Artifact naming.
//!
//! Every stage output is addressed by an [`ArtifactKey`]: a stage directory
//! plus a file stem built from the run's date range, time step and the
//! stage's own parameters.

use crate::domain::interval::{Interval, Period};
use crate::domain::normalize::Normalization;
use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Prices,
    Returns,
    Volatility,
    NormalizedReturns,
    CorrelationMatrix,
    IntervalCorrelation,
    BlockCorrelation,
    ReturnDensity,
    AggregatedDistribution,
    DensityComparison,
}

impl Stage {
    pub fn directory(&self) -> &'static str {
        match self {
            Stage::Prices => "prices",
            Stage::Returns => "returns",
            Stage::Volatility => "volatility",
            Stage::NormalizedReturns => "normalized_returns",
            Stage::CorrelationMatrix => "correlation_matrix",
            Stage::IntervalCorrelation => "interval_correlation",
            Stage::BlockCorrelation => "block_correlation",
            Stage::ReturnDensity => "returns_distribution",
            Stage::AggregatedDistribution | Stage::DensityComparison => "aggregated_distribution",
        }
    }
}

/// Identifies one run of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTag {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub time_step: String,
}

impl RunTag {
    pub fn new(start: NaiveDate, end: NaiveDate, time_step: impl Into<String>) -> Self {
        Self {
            start,
            end,
            time_step: time_step.into(),
        }
    }

    fn suffix(&self) -> String {
        format!(
            "{}_{}_step_{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d"),
            self.time_step
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub stage: Stage,
    pub name: String,
}

impl ArtifactKey {
    fn new(stage: Stage, name: String) -> Self {
        Self { stage, name }
    }

    pub fn prices(tag: &RunTag) -> Self {
        Self::new(Stage::Prices, format!("prices_data_{}", tag.suffix()))
    }

    pub fn returns(tag: &RunTag) -> Self {
        Self::new(Stage::Returns, format!("returns_data_{}", tag.suffix()))
    }

    pub fn volatility(tag: &RunTag, window: usize) -> Self {
        Self::new(
            Stage::Volatility,
            format!("volatility_data_win_{}_{}", window, tag.suffix()),
        )
    }

    pub fn normalized(tag: &RunTag, norm: &Normalization) -> Self {
        Self::new(
            Stage::NormalizedReturns,
            format!("normalized_returns_data_{}_{}", norm, tag.suffix()),
        )
    }

    pub fn correlation(tag: &RunTag, norm: &Normalization) -> Self {
        Self::new(
            Stage::CorrelationMatrix,
            format!("correlation_matrix_data_{}_{}", norm, tag.suffix()),
        )
    }

    pub fn period_correlation(
        tag: &RunTag,
        norm: &Normalization,
        year: i32,
        interval: Interval,
        period: &Period,
    ) -> Self {
        Self::new(
            Stage::IntervalCorrelation,
            format!(
                "correlation_matrix_data_{}_{}_int_{}_{}_step_{}",
                norm,
                year,
                interval,
                period.label(),
                tag.time_step
            ),
        )
    }

    pub fn block_correlation(tag: &RunTag, norm: &Normalization, block: usize, index: usize) -> Self {
        Self::new(
            Stage::BlockCorrelation,
            format!(
                "correlation_matrix_data_{}_block_{}_{:03}_{}",
                norm,
                block,
                index,
                tag.suffix()
            ),
        )
    }

    /// Density of one instrument's normalized returns against N(0, 1).
    pub fn return_density(tag: &RunTag, norm: &Normalization, column: &str) -> Self {
        Self::new(
            Stage::ReturnDensity,
            format!("returns_density_{}_{}_{}", column, norm, tag.suffix()),
        )
    }

    pub fn aggregated(tag: &RunTag, norm: &Normalization) -> Self {
        Self::new(
            Stage::AggregatedDistribution,
            format!("aggregated_distribution_{}_{}", norm, tag.suffix()),
        )
    }

    pub fn density(tag: &RunTag, norm: &Normalization) -> Self {
        Self::new(
            Stage::DensityComparison,
            format!("aggregated_density_{}_{}", norm, tag.suffix()),
        )
    }

    /// Path relative to the store root.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.stage.directory()).join(format!("{}.csv", self.name))
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative_path().display())
    }
}
