//! Pearson correlation matrices.
//!
//! Coefficients are computed over pairwise-complete observations, one pair of
//! columns at a time. Only the upper triangle is computed; each coefficient is
//! mirrored, so the matrix is exactly symmetric.

use crate::domain::error::CorrError;
use crate::domain::frame::TimeFrame;
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    pub fn get_by_label(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        Some(self.get(i, j))
    }

    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        let n = self.size();
        (0..n).all(|i| {
            (0..n).all(|j| {
                let (a, b) = (self.values[i][j], self.values[j][i]);
                (a.is_nan() && b.is_nan()) || (a - b).abs() <= tolerance
            })
        })
    }

    pub fn has_unit_diagonal(&self, tolerance: f64) -> bool {
        (0..self.size()).all(|i| (self.values[i][i] - 1.0).abs() <= tolerance)
    }

    /// Mean of the off-diagonal coefficients, ignoring missing ones.
    pub fn mean_off_diagonal(&self) -> Option<f64> {
        let n = self.size();
        let off: Vec<f64> = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| self.values[i][j])
            .filter(|v| v.is_finite())
            .collect();
        if off.is_empty() {
            None
        } else {
            Some(off.iter().sum::<f64>() / off.len() as f64)
        }
    }
}

/// Pearson coefficient of `x` and `y` over rows where both are finite.
///
/// Missing (`NaN`) when fewer than two such rows exist or either side has
/// zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return f64::NAN;
    }

    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Correlation matrix across the columns of `frame`.
pub fn correlation_matrix(frame: &TimeFrame) -> Result<CorrelationMatrix, CorrError> {
    let n = frame.n_cols();
    if n < 2 {
        return Err(CorrError::InsufficientColumns {
            needed: 2,
            found: n,
        });
    }

    let mut values = vec![vec![f64::NAN; n]; n];
    for (i, row) in values.iter_mut().enumerate() {
        // pandas reports 1 on the diagonal of every column with spread.
        let self_corr = pearson(frame.column(i), frame.column(i));
        row[i] = if self_corr.is_nan() { f64::NAN } else { 1.0 };
    }

    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
    let coefficients: Vec<(usize, usize, f64)> = pairs
        .par_iter()
        .map(|&(i, j)| (i, j, pearson(frame.column(i), frame.column(j))))
        .collect();

    for (i, j, c) in coefficients {
        values[i][j] = c;
        values[j][i] = c;
    }

    Ok(CorrelationMatrix {
        labels: frame.columns.clone(),
        values,
    })
}
