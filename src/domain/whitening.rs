//! Pairwise decorrelation of two return series.
//!
//! For a pair (X, Y) with sample covariance Σ = V Λ Vᵀ the whitening map is
//!
//!   W = Λ^{-1/2} Vᵀ
//!
//! so that W Σ Wᵀ = I. Projecting the centred pair through W gives two
//! uncorrelated, unit-variance columns.

use crate::domain::error::CorrError;
use nalgebra::{Matrix2, SymmetricEigen, Vector2};

/// Smallest eigenvalue allowed, relative to the largest one.
pub const EIGENVALUE_TOLERANCE: f64 = 1e-12;

/// Rows where both values are finite.
fn complete_rows(x: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    x.iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect()
}

fn pair_means(rows: &[(f64, f64)]) -> (f64, f64) {
    let n = rows.len() as f64;
    let mx = rows.iter().map(|r| r.0).sum::<f64>() / n;
    let my = rows.iter().map(|r| r.1).sum::<f64>() / n;
    (mx, my)
}

/// 2×2 sample covariance (n-1 denominator) over the complete rows of the pair.
pub fn pair_covariance(x: &[f64], y: &[f64]) -> Result<Matrix2<f64>, CorrError> {
    let rows = complete_rows(x, y);
    covariance_of(&rows)
}

fn covariance_of(rows: &[(f64, f64)]) -> Result<Matrix2<f64>, CorrError> {
    if rows.len() < 2 {
        return Err(CorrError::DegeneratePair {
            reason: format!("{} complete observations, need at least 2", rows.len()),
        });
    }
    let (mx, my) = pair_means(rows);
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in rows {
        let dx = a - mx;
        let dy = b - my;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let denom = (rows.len() - 1) as f64;
    Ok(Matrix2::new(sxx / denom, sxy / denom, sxy / denom, syy / denom))
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhiteningTransform {
    pub eigenvalues: Vector2<f64>,
    /// Eigenvectors as columns.
    pub eigenvectors: Matrix2<f64>,
    pub matrix: Matrix2<f64>,
}

impl WhiteningTransform {
    pub fn from_covariance(covariance: &Matrix2<f64>) -> Result<Self, CorrError> {
        if covariance.iter().any(|v| !v.is_finite()) {
            return Err(CorrError::DegeneratePair {
                reason: "covariance has non-finite entries".into(),
            });
        }

        let eigen = SymmetricEigen::new(*covariance);
        let smallest = eigen.eigenvalues.min();
        let largest = eigen.eigenvalues.max();
        if smallest <= 0.0 || smallest <= EIGENVALUE_TOLERANCE * largest {
            return Err(CorrError::DegeneratePair {
                reason: format!(
                    "singular covariance (eigenvalues {:.3e}, {:.3e})",
                    smallest, largest
                ),
            });
        }

        let scale = Matrix2::from_diagonal(&eigen.eigenvalues.map(|l| 1.0 / l.sqrt()));
        let matrix = scale * eigen.eigenvectors.transpose();
        Ok(Self {
            eigenvalues: eigen.eigenvalues,
            eigenvectors: eigen.eigenvectors,
            matrix,
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let v = self.matrix * Vector2::new(x, y);
        (v[0], v[1])
    }

    /// Covariance of the projected pair: W Σ Wᵀ.
    pub fn transformed_covariance(&self, covariance: &Matrix2<f64>) -> Matrix2<f64> {
        self.matrix * covariance * self.matrix.transpose()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhitenedPair {
    pub first: Vec<f64>,
    pub second: Vec<f64>,
}

impl WhitenedPair {
    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// Both whitened columns back to back, first then second.
    pub fn pooled(self) -> Vec<f64> {
        let mut values = self.first;
        values.extend(self.second);
        values
    }
}

/// Centres the complete rows of the pair and projects them through the
/// whitening transform of their covariance.
pub fn whiten_pair(x: &[f64], y: &[f64]) -> Result<WhitenedPair, CorrError> {
    let rows = complete_rows(x, y);
    let covariance = covariance_of(&rows)?;
    let transform = WhiteningTransform::from_covariance(&covariance)?;
    let (mx, my) = pair_means(&rows);

    let (first, second) = rows
        .iter()
        .map(|(a, b)| transform.apply(a - mx, b - my))
        .unzip();
    Ok(WhitenedPair { first, second })
}
