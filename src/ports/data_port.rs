//! Price data access port trait.

use crate::domain::error::CorrError;
use crate::domain::price::PricePoint;
use chrono::NaiveDate;

pub trait DataPort {
    /// Prices of `ticker` with `start_date <= date <= end_date`, ascending.
    fn fetch_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, CorrError>;

    fn list_symbols(&self) -> Result<Vec<String>, CorrError>;

    /// First date, last date and number of observations, if any.
    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CorrError>;
}
