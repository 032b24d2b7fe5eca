//! Calendar intervals and business-day blocks.
//!
//! A year is split into half-open periods `[start, end)` that are contiguous,
//! non-overlapping and cover every day of the year:
//! - week: 52 periods starting on 1 January every 7 days, the last one
//!   absorbing the 1-2 leftover days;
//! - month: the 12 calendar months;
//! - quarter: January, April, July and October starts;
//! - year: the whole year.

use crate::domain::correlation::{CorrelationMatrix, correlation_matrix};
use crate::domain::error::CorrError;
use crate::domain::frame::TimeFrame;
use chrono::{Datelike, Days, NaiveDate};
use std::fmt;
use std::str::FromStr;

const WEEKS_PER_YEAR: usize = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Week,
    Month,
    Quarter,
    Year,
}

impl Interval {
    pub const ALL: [Interval; 4] = [
        Interval::Week,
        Interval::Month,
        Interval::Quarter,
        Interval::Year,
    ];

    /// Number of periods in one year.
    pub fn periods(&self) -> usize {
        match self {
            Interval::Week => WEEKS_PER_YEAR,
            Interval::Month => 12,
            Interval::Quarter => 4,
            Interval::Year => 1,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Interval::Week => "week",
            Interval::Month => "month",
            Interval::Quarter => "quarter",
            Interval::Year => "year",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" | "w" => Ok(Interval::Week),
            "month" | "m" => Ok(Interval::Month),
            "quarter" | "q" => Ok(Interval::Quarter),
            "year" | "y" => Ok(Interval::Year),
            other => Err(format!("unknown interval '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    /// 1-based position in the year.
    pub index: usize,
    pub start: NaiveDate,
    /// Exclusive.
    pub end: NaiveDate,
}

impl Period {
    /// Zero-padded index, `01`, `02`, ...
    pub fn label(&self) -> String {
        format!("{:02}", self.index)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, CorrError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| CorrError::InvalidInput {
        reason: format!("date {:04}-{:02}-{:02} out of range", year, month, day),
    })
}

pub fn partition_year(year: i32, interval: Interval) -> Result<Vec<Period>, CorrError> {
    let first = ymd(year, 1, 1)?;
    let next_year = ymd(year + 1, 1, 1)?;

    let starts: Vec<NaiveDate> = match interval {
        Interval::Week => (0..WEEKS_PER_YEAR as u64)
            .map(|k| first + Days::new(7 * k))
            .collect(),
        Interval::Month => (1..=12)
            .map(|m| ymd(year, m, 1))
            .collect::<Result<_, _>>()?,
        Interval::Quarter => [1, 4, 7, 10]
            .into_iter()
            .map(|m| ymd(year, m, 1))
            .collect::<Result<_, _>>()?,
        Interval::Year => vec![first],
    };

    Ok(starts
        .iter()
        .enumerate()
        .map(|(i, &start)| Period {
            index: i + 1,
            start,
            end: starts.get(i + 1).copied().unwrap_or(next_year),
        })
        .collect())
}

/// Distinct calendar years touched by the frame's dates, ascending.
pub fn years_in(frame: &TimeFrame) -> Vec<i32> {
    let mut years: Vec<i32> = frame.dates.iter().map(|d| d.year()).collect();
    years.dedup();
    years
}

#[derive(Debug, Clone)]
pub struct PeriodCorrelation {
    pub period: Period,
    pub observations: usize,
    pub matrix: CorrelationMatrix,
}

/// One correlation matrix per period of `year`, from the rows inside it.
///
/// Periods with fewer than two observations still produce a matrix; its
/// coefficients are missing.
pub fn interval_correlations(
    frame: &TimeFrame,
    year: i32,
    interval: Interval,
) -> Result<Vec<PeriodCorrelation>, CorrError> {
    partition_year(year, interval)?
        .into_iter()
        .map(|period| {
            let slice = frame.slice_dates(period.start, period.end);
            Ok(PeriodCorrelation {
                period,
                observations: slice.n_rows(),
                matrix: correlation_matrix(&slice)?,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct BlockCorrelation {
    /// 1-based block number.
    pub index: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub observations: usize,
    pub matrix: CorrelationMatrix,
}

/// Splits the frame into consecutive blocks of `block` observed rows.
///
/// A trailing partial block is kept when it has at least two rows.
pub fn business_day_blocks(frame: &TimeFrame, block: usize) -> Result<Vec<TimeFrame>, CorrError> {
    if block < 2 {
        return Err(CorrError::InvalidWindow {
            window: block,
            reason: "business-day block must hold at least 2 rows".into(),
        });
    }
    Ok((0..frame.n_rows())
        .step_by(block)
        .map(|start| frame.slice_rows(start..start + block))
        .filter(|b| b.n_rows() >= 2)
        .collect())
}

pub fn block_correlations(
    frame: &TimeFrame,
    block: usize,
) -> Result<Vec<BlockCorrelation>, CorrError> {
    business_day_blocks(frame, block)?
        .into_iter()
        .enumerate()
        .filter_map(|(i, b)| match (b.first_date(), b.last_date()) {
            (Some(first_date), Some(last_date)) => Some((i, b, first_date, last_date)),
            _ => None,
        })
        .map(|(i, b, first_date, last_date)| {
            Ok(BlockCorrelation {
                index: i + 1,
                first_date,
                last_date,
                observations: b.n_rows(),
                matrix: correlation_matrix(&b)?,
            })
        })
        .collect()
}
