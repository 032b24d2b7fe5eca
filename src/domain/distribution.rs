//! Empirical densities and the Gaussian reference.

use crate::domain::error::CorrError;
use statrs::distribution::{Continuous, Normal};

/// Density of N(mean, variance) at `x`. `NaN` for a non-positive variance.
pub fn gaussian_pdf(mean: f64, variance: f64, x: f64) -> f64 {
    match Normal::new(mean, variance.sqrt()) {
        Ok(normal) => normal.pdf(x),
        Err(_) => f64::NAN,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` ascending edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    /// Normalized so that the histogram integrates to one over the range.
    pub density: Vec<f64>,
}

impl Histogram {
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }
}

/// Equal-width density histogram over `[lo, hi]`.
///
/// Values outside the range (and non-finite values) are ignored. Bins are
/// half-open except the last, which includes `hi`.
pub fn density_histogram(values: &[f64], bins: usize, range: (f64, f64)) -> Result<Histogram, CorrError> {
    let (lo, hi) = range;
    if bins == 0 {
        return Err(CorrError::InvalidInput {
            reason: "histogram needs at least one bin".into(),
        });
    }
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(CorrError::InvalidInput {
            reason: format!("invalid histogram range [{}, {}]", lo, hi),
        });
    }

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0usize; bins];
    for &v in values {
        if !v.is_finite() || v < lo || v > hi {
            continue;
        }
        let bin = (((v - lo) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }

    let total: usize = counts.iter().sum();
    let density = counts
        .iter()
        .map(|&c| {
            if total == 0 {
                0.0
            } else {
                c as f64 / (total as f64 * width)
            }
        })
        .collect();

    Ok(Histogram {
        edges,
        counts,
        density,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensityRow {
    pub center: f64,
    pub empirical: f64,
    pub gaussian: f64,
}

/// Empirical density of `values` next to the standard Gaussian, per bin.
pub fn compare_to_gaussian(
    values: &[f64],
    bins: usize,
    range: (f64, f64),
) -> Result<Vec<DensityRow>, CorrError> {
    let hist = density_histogram(values, bins, range)?;
    Ok(hist
        .centers()
        .into_iter()
        .zip(&hist.density)
        .map(|(center, &empirical)| DensityRow {
            center,
            empirical,
            gaussian: gaussian_pdf(0.0, 1.0, center),
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub count: usize,
    pub mean: f64,
    /// Sample variance (n-1 denominator).
    pub variance: f64,
    pub skewness: f64,
    /// Kurtosis minus 3; zero for a Gaussian.
    pub excess_kurtosis: f64,
}

/// Moments of the finite values, `None` with fewer than two of them.
pub fn moments(values: &[f64]) -> Option<Moments> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n = finite.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean = finite.iter().sum::<f64>() / nf;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in &finite {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    let (m2, m3, m4) = (m2 / nf, m3 / nf, m4 / nf);
    let (skewness, excess_kurtosis) = if m2 > 0.0 {
        (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
    } else {
        (f64::NAN, f64::NAN)
    };

    Some(Moments {
        count: n,
        mean,
        variance: m2 * nf / (nf - 1.0),
        skewness,
        excess_kurtosis,
    })
}
