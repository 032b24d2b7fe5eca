//! Percentage returns of consecutive prices.
//!
//! r[t] = p[t] / p[t-1] - 1
//! The first row has no predecessor and is dropped, as is every row with a
//! missing return in any column.

use crate::domain::frame::TimeFrame;

pub fn compute_returns(prices: &TimeFrame) -> TimeFrame {
    if prices.n_rows() < 2 {
        return TimeFrame::empty(prices.columns.clone());
    }

    let returns = TimeFrame {
        dates: prices.dates[1..].to_vec(),
        columns: prices.columns.clone(),
        values: prices.values.iter().map(|col| pct_change(col)).collect(),
    };
    returns.drop_incomplete_rows()
}

/// Relative change of consecutive values; one element shorter than `values`.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| {
            let (prev, curr) = (w[0], w[1]);
            if prev.is_finite() && curr.is_finite() && prev != 0.0 {
                curr / prev - 1.0
            } else {
                f64::NAN
            }
        })
        .collect()
}
