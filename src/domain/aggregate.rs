//! Aggregated distribution of whitened returns over all instrument pairs.

use crate::domain::error::CorrError;
use crate::domain::frame::TimeFrame;
use crate::domain::whitening::whiten_pair;
use rayon::prelude::*;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPair {
    pub first: String,
    pub second: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct AggregatedDistribution {
    pub values: Vec<f64>,
    pub pairs_used: Vec<(String, String)>,
    pub pairs_skipped: Vec<SkippedPair>,
}

impl AggregatedDistribution {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// All (i, j) with i < j, ordered by i then j.
pub fn column_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect()
}

/// Whitens every column pair of `frame` and pools the results.
///
/// Pairs are processed in parallel; the pooled sample keeps pair order.
/// A degenerate pair is logged and recorded in `pairs_skipped`.
pub fn aggregate_pairs(frame: &TimeFrame) -> Result<AggregatedDistribution, CorrError> {
    let n = frame.n_cols();
    if n < 2 {
        return Err(CorrError::InsufficientColumns {
            needed: 2,
            found: n,
        });
    }

    let results: Vec<((usize, usize), Result<Vec<f64>, CorrError>)> = column_pairs(n)
        .into_par_iter()
        .map(|(i, j)| {
            let pooled = whiten_pair(frame.column(i), frame.column(j)).map(|p| p.pooled());
            ((i, j), pooled)
        })
        .collect();

    let mut dist = AggregatedDistribution::default();
    for ((i, j), result) in results {
        let (first, second) = (frame.columns[i].clone(), frame.columns[j].clone());
        match result {
            Ok(values) => {
                debug!(%first, %second, samples = values.len(), "pair whitened");
                dist.values.extend(values);
                dist.pairs_used.push((first, second));
            }
            Err(e) => {
                warn!(%first, %second, error = %e, "skipping pair");
                dist.pairs_skipped.push(SkippedPair {
                    first,
                    second,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(dist)
}
