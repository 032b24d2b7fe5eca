//! Trailing-window statistics.
//!
//! The window at row i covers rows i-(n-1) ..= i. The first (n-1) rows lack
//! history and are not part of the output, so the result starts at the date
//! of row n-1. A window holding a missing value yields a missing value.

use crate::domain::error::CorrError;
use crate::domain::frame::TimeFrame;

pub fn rolling_mean(frame: &TimeFrame, window: usize) -> Result<TimeFrame, CorrError> {
    check_window(window, 1)?;
    Ok(rolling(frame, window, mean))
}

/// Sample standard deviation (n-1 denominator) over each window.
pub fn rolling_std(frame: &TimeFrame, window: usize) -> Result<TimeFrame, CorrError> {
    check_window(window, 2)?;
    Ok(rolling(frame, window, sample_std))
}

/// Rolling volatility of returns with incomplete rows removed.
pub fn volatility(returns: &TimeFrame, window: usize) -> Result<TimeFrame, CorrError> {
    Ok(rolling_std(returns, window)?.drop_incomplete_rows())
}

fn check_window(window: usize, minimum: usize) -> Result<(), CorrError> {
    if window < minimum {
        return Err(CorrError::InvalidWindow {
            window,
            reason: format!("window must be at least {}", minimum),
        });
    }
    Ok(())
}

fn rolling(frame: &TimeFrame, window: usize, stat: fn(&[f64]) -> f64) -> TimeFrame {
    let warmup = window - 1;
    if frame.n_rows() <= warmup {
        return TimeFrame::empty(frame.columns.clone());
    }

    TimeFrame {
        dates: frame.dates[warmup..].to_vec(),
        columns: frame.columns.clone(),
        values: frame
            .values
            .iter()
            .map(|col| {
                col.windows(window)
                    .map(|w| {
                        if w.iter().all(|v| v.is_finite()) {
                            stat(w)
                        } else {
                            f64::NAN
                        }
                    })
                    .collect()
            })
            .collect(),
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}
