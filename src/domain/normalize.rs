//! Global and local (rolling) z-score normalization of returns.

use crate::domain::error::CorrError;
use crate::domain::frame::TimeFrame;
use crate::domain::rolling::{mean, rolling_mean, rolling_std, sample_std};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalization {
    /// Whole-series mean and standard deviation per column.
    Global,
    /// Trailing window of `window` observations including the current one.
    Local { window: usize },
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalization::Global => write!(f, "global"),
            Normalization::Local { window } => write!(f, "local_win_{}", window),
        }
    }
}

impl FromStr for Normalization {
    type Err = String;

    /// Accepts `global`, `local_win_<n>` and `local:<n>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "global" {
            return Ok(Normalization::Global);
        }
        let window = s
            .strip_prefix("local_win_")
            .or_else(|| s.strip_prefix("local:"))
            .ok_or_else(|| format!("unknown normalization '{}'", s))?;
        window
            .parse()
            .map(|window| Normalization::Local { window })
            .map_err(|_| format!("invalid local window '{}'", window))
    }
}

pub fn normalize(returns: &TimeFrame, kind: &Normalization) -> Result<TimeFrame, CorrError> {
    match *kind {
        Normalization::Global => Ok(normalize_global(returns)),
        Normalization::Local { window } => normalize_local(returns, window),
    }
}

/// (x - mean) / std per column over the finite values of that column.
///
/// A column with fewer than two finite values, or with zero variance,
/// comes out entirely missing.
pub fn normalize_global(returns: &TimeFrame) -> TimeFrame {
    returns.map_columns(|col| {
        let finite: Vec<f64> = col.iter().copied().filter(|v| v.is_finite()).collect();
        let std = sample_std(&finite);
        if !std.is_finite() || std == 0.0 {
            return vec![f64::NAN; col.len()];
        }
        let m = mean(&finite);
        col.iter().map(|v| (v - m) / std).collect()
    })
}

/// (x[t] - mean_w[t]) / std_w[t] with trailing windows of length `window`.
///
/// The first `window - 1` rows are discarded. A zero local deviation gives a
/// missing value for that row.
pub fn normalize_local(returns: &TimeFrame, window: usize) -> Result<TimeFrame, CorrError> {
    let means = rolling_mean(returns, window)?;
    let stds = rolling_std(returns, window)?;
    let offset = window - 1;

    let values = returns
        .values
        .iter()
        .zip(means.values.iter().zip(&stds.values))
        .map(|(col, (m, s))| {
            col.iter()
                .skip(offset)
                .zip(m.iter().zip(s))
                .map(|(x, (m, s))| if *s > 0.0 { (x - m) / s } else { f64::NAN })
                .collect()
        })
        .collect();

    Ok(TimeFrame {
        dates: means.dates,
        columns: returns.columns.clone(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn frame(columns: Vec<Vec<f64>>) -> TimeFrame {
        let rows = columns[0].len();
        let dates = (0..rows)
            .map(|i| NaiveDate::from_ymd_opt(2023, 5, (i + 1) as u32).unwrap())
            .collect();
        let names = (0..columns.len()).map(|i| format!("C{}", i)).collect();
        TimeFrame::new(dates, names, columns).unwrap()
    }

    #[test]
    fn display_and_parse_roundtrip() {
        assert_eq!(Normalization::Global.to_string(), "global");
        assert_eq!(Normalization::Local { window: 25 }.to_string(), "local_win_25");
        assert_eq!("local:10".parse::<Normalization>(), Ok(Normalization::Local { window: 10 }));
        assert_eq!("GLOBAL".parse::<Normalization>(), Ok(Normalization::Global));
        assert!("rolling".parse::<Normalization>().is_err());
        assert!("local_win_x".parse::<Normalization>().is_err());
    }

    #[test]
    fn global_has_zero_mean_unit_std() {
        let f = frame(vec![vec![0.01, -0.02, 0.03, 0.0, 0.015]]);
        let n = normalize_global(&f);
        let col = n.column(0);
        assert_relative_eq!(mean(col), 0.0, epsilon = 1e-12);
        assert_relative_eq!(sample_std(col), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn global_constant_column_is_missing() {
        let f = frame(vec![vec![1.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]]);
        let n = normalize_global(&f);
        assert!(n.column(0).iter().all(|v| v.is_nan()));
        assert_relative_eq!(n.column(1)[0], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn global_ignores_missing_values_in_statistics() {
        let f = frame(vec![vec![1.0, f64::NAN, 3.0]]);
        let n = normalize_global(&f);
        assert!(n.column(0)[1].is_nan());
        assert_relative_eq!(n.column(0)[0], -(2.0f64.sqrt()) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn local_discards_warmup_rows() {
        let f = frame(vec![vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0]]);
        let n = normalize_local(&f, 3).unwrap();

        assert_eq!(n.n_rows(), 4);
        assert_eq!(n.dates[0], f.dates[2]);
        // Window [1, 2, 4]: mean 7/3, std sqrt(7/3).
        let expected = (4.0 - 7.0 / 3.0) / (7.0f64 / 3.0).sqrt();
        assert_relative_eq!(n.column(0)[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn local_zero_std_is_missing() {
        let f = frame(vec![vec![1.0, 1.0, 1.0, 2.0]]);
        let n = normalize_local(&f, 2).unwrap();
        assert!(n.column(0)[0].is_nan());
        assert!(n.column(0)[2].is_finite());
    }

    #[test]
    fn normalize_dispatches() {
        let f = frame(vec![vec![1.0, 2.0, 3.0, 5.0]]);
        let local = normalize(&f, &Normalization::Local { window: 2 }).unwrap();
        assert_eq!(local.n_rows(), 3);
        let global = normalize(&f, &Normalization::Global).unwrap();
        assert_eq!(global.n_rows(), 4);
    }
}
