//! Date-indexed matrix of per-instrument values.
//!
//! `TimeFrame` backs the price, returns, rolling-statistic and normalized
//! returns matrices. Values are stored column by column (`values[col][row]`)
//! and a missing observation is `f64::NAN`.

use crate::domain::error::CorrError;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeFrame {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl TimeFrame {
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, CorrError> {
        if columns.len() != values.len() {
            return Err(CorrError::Shape {
                reason: format!(
                    "{} column names for {} value columns",
                    columns.len(),
                    values.len()
                ),
            });
        }
        if let Some((name, col)) = columns
            .iter()
            .zip(&values)
            .find(|(_, col)| col.len() != dates.len())
        {
            return Err(CorrError::Shape {
                reason: format!(
                    "column {} has {} rows, index has {}",
                    name,
                    col.len(),
                    dates.len()
                ),
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(CorrError::Shape {
                reason: format!("duplicate column {}", dup),
            });
        }
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(CorrError::Shape {
                reason: format!("dates not strictly ascending at {}", pair[1]),
            });
        }
        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    /// A frame with the given columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        let values = vec![Vec::new(); columns.len()];
        Self {
            dates: Vec::new(),
            columns,
            values,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, index: usize) -> &[f64] {
        &self.values[index]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&[f64]> {
        self.column_index(name).map(|i| self.column(i))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Rows by position. The range is clamped to the frame.
    pub fn slice_rows(&self, range: Range<usize>) -> TimeFrame {
        let end = range.end.min(self.n_rows());
        let start = range.start.min(end);
        TimeFrame {
            dates: self.dates[start..end].to_vec(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|col| col[start..end].to_vec())
                .collect(),
        }
    }

    /// Rows with `start <= date < end`.
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> TimeFrame {
        let from = self.dates.partition_point(|d| *d < start);
        let to = self.dates.partition_point(|d| *d < end);
        self.slice_rows(from..to.max(from))
    }

    /// Keeps the rows selected by `keep`, in order.
    pub fn select_rows(&self, keep: &[usize]) -> TimeFrame {
        TimeFrame {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|col| keep.iter().map(|&i| col[i]).collect())
                .collect(),
        }
    }

    /// Whether every column has a finite value at `row`.
    pub fn row_is_complete(&self, row: usize) -> bool {
        self.values.iter().all(|col| col[row].is_finite())
    }

    /// Removes every row with a missing or non-finite value in any column.
    pub fn drop_incomplete_rows(&self) -> TimeFrame {
        let keep: Vec<usize> = (0..self.n_rows())
            .filter(|&i| self.row_is_complete(i))
            .collect();
        self.select_rows(&keep)
    }

    /// Number of missing observations per column.
    pub fn missing_counts(&self) -> Vec<usize> {
        self.values
            .iter()
            .map(|col| col.iter().filter(|v| !v.is_finite()).count())
            .collect()
    }

    /// Applies `f` to each column, keeping dates and names.
    pub fn map_columns<F>(&self, f: F) -> TimeFrame
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        TimeFrame {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|col| f(col)).collect(),
        }
    }
}
