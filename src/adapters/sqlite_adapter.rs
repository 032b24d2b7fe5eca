//! SQLite price store adapter.
//!
//! Closing prices live in a single `prices(ticker, date, close)` table keyed
//! on `(ticker, date)`. Dates are stored as `YYYY-MM-DD` text so that string
//! comparison orders them chronologically.

use crate::domain::error::CorrError;
use crate::domain::price::PricePoint;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> CorrError {
    CorrError::Data {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> CorrError {
    CorrError::DataQuery {
        reason: e.to_string(),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, CorrError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| CorrError::Data {
        reason: format!("invalid stored date '{}': {}", s, e),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CorrError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| CorrError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4);
        let pool_size = u32::try_from(pool_size)
            .ok()
            .filter(|&n| n >= 1)
            .ok_or_else(|| CorrError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: format!("pool_size must be between 1 and {}, got {}", u32::MAX, pool_size),
            })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, CorrError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, CorrError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), CorrError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS prices (
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    close REAL NOT NULL,
                    PRIMARY KEY (ticker, date)
                );
                CREATE INDEX IF NOT EXISTS idx_prices_date ON prices(date);",
            )
            .map_err(query_error)
    }

    /// Upserts `points` for `ticker` in one transaction.
    pub fn insert_prices(&self, ticker: &str, points: &[PricePoint]) -> Result<(), CorrError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for point in points {
            tx.execute(
                "INSERT OR REPLACE INTO prices (ticker, date, close) VALUES (?1, ?2, ?3)",
                params![ticker, point.date.format("%Y-%m-%d").to_string(), point.close],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, CorrError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT date, close FROM prices
                 WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    ticker,
                    start_date.format("%Y-%m-%d").to_string(),
                    end_date.format("%Y-%m-%d").to_string()
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )
            .map_err(query_error)?;

        let mut points = Vec::new();
        for row in rows {
            let (date, close) = row.map_err(query_error)?;
            points.push(PricePoint::new(parse_date(&date)?, close));
        }
        Ok(points)
    }

    fn list_symbols(&self) -> Result<Vec<String>, CorrError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM prices ORDER BY ticker")
            .map_err(query_error)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_error)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_error)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CorrError> {
        let result: (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM prices WHERE ticker = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_date(&min)?, parse_date(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_prices(
                "EUR_USD",
                &[
                    PricePoint::new(date(3), 1.10),
                    PricePoint::new(date(1), 1.08),
                    PricePoint::new(date(2), 1.09),
                ],
            )
            .unwrap();
        adapter
            .insert_prices("BTC_USD", &[PricePoint::new(date(1), 42000.0)])
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(CorrError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn from_config_rejects_out_of_range_pool_size() {
        use crate::adapters::file_config_adapter::FileConfigAdapter;

        for size in ["0", "-3", "4294967296"] {
            let config = FileConfigAdapter::from_string(&format!(
                "[sqlite]\npath = :memory:\npool_size = {size}\n"
            ))
            .unwrap();
            match SqliteAdapter::from_config(&config) {
                Err(CorrError::ConfigInvalid { key, .. }) => assert_eq!(key, "pool_size"),
                Err(other) => panic!("expected ConfigInvalid, got: {other}"),
                Ok(_) => panic!("pool_size {size} accepted"),
            }
        }
    }

    #[test]
    fn fetch_prices_sorted_and_bounded() {
        let adapter = seeded();

        let all = adapter.fetch_prices("EUR_USD", date(1), date(31)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].date, date(1));
        assert_eq!(all[2].close, 1.10);

        let middle = adapter.fetch_prices("EUR_USD", date(2), date(2)).unwrap();
        assert_eq!(middle, vec![PricePoint::new(date(2), 1.09)]);
    }

    #[test]
    fn insert_replaces_existing_date() {
        let adapter = seeded();
        adapter
            .insert_prices("EUR_USD", &[PricePoint::new(date(2), 1.5)])
            .unwrap();
        let points = adapter.fetch_prices("EUR_USD", date(2), date(2)).unwrap();
        assert_eq!(points[0].close, 1.5);
    }

    #[test]
    fn list_symbols_is_sorted() {
        assert_eq!(seeded().list_symbols().unwrap(), vec!["BTC_USD", "EUR_USD"]);
    }

    #[test]
    fn data_range() {
        let adapter = seeded();
        assert_eq!(
            adapter.get_data_range("EUR_USD").unwrap(),
            Some((date(1), date(3), 3))
        );
        assert_eq!(adapter.get_data_range("XYZ").unwrap(), None);
    }
}
