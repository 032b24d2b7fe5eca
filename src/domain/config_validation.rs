//! Configuration validation.
//!
//! Checks every field an analysis run depends on before any stage touches
//! the data.

use crate::domain::analysis::DataSource;
use crate::domain::error::CorrError;
use crate::domain::interval::Interval;
use crate::domain::normalize::Normalization;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), CorrError> {
    validate_tickers(config)?;
    validate_dates(config)?;
    validate_source(config)?;
    validate_non_negative(config, "data", "max_missing")?;
    validate_normalization(config)?;
    validate_window(config, "analysis", "volatility_window")?;
    validate_intervals(config)?;
    validate_years(config)?;
    validate_block_size(config)?;
    validate_histogram(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> CorrError {
    CorrError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_tickers(config: &dyn ConfigPort) -> Result<(), CorrError> {
    match config.get_string("data", "tickers") {
        Some(s) if !s.trim().is_empty() => parse_tickers(&s)
            .map(|_| ())
            .map_err(|e| invalid("data", "tickers", e.to_string())),
        _ => Err(CorrError::ConfigMissing {
            section: "data".to_string(),
            key: "tickers".to_string(),
        }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), CorrError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "data",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

/// Reads a required `YYYY-MM-DD` key from `[data]`.
pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, CorrError> {
    match config.get_string("data", field) {
        None => Err(CorrError::ConfigMissing {
            section: "data".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "data",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_source(config: &dyn ConfigPort) -> Result<(), CorrError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .parse::<DataSource>()
        .map_err(|e| invalid("data", "source", e))?;

    let (section, key) = match source {
        DataSource::Csv => ("data", "path"),
        DataSource::Sqlite => ("sqlite", "path"),
    };
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(CorrError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Rejects a present but non-integer value, which `get_int` would silently
/// replace by its default.
fn validate_integer(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), CorrError> {
    match config.get_string(section, key) {
        Some(s) if s.trim().parse::<i64>().is_err() => {
            Err(invalid(section, key, format!("'{}' is not an integer", s.trim())))
        }
        _ => Ok(()),
    }
}

fn validate_non_negative(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), CorrError> {
    validate_integer(config, section, key)?;
    if config.get_int(section, key, 0) < 0 {
        return Err(invalid(section, key, format!("{} must be non-negative", key)));
    }
    Ok(())
}

fn validate_window(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), CorrError> {
    validate_integer(config, section, key)?;
    if config.get_int(section, key, 2) < 2 {
        return Err(invalid(section, key, format!("{} must be at least 2", key)));
    }
    Ok(())
}

fn validate_normalization(config: &dyn ConfigPort) -> Result<(), CorrError> {
    let Some(value) = config.get_string("analysis", "normalization") else {
        return Ok(());
    };
    let value = value.trim().to_lowercase();
    if value == "local" {
        return validate_window(config, "analysis", "window");
    }
    match value.parse::<Normalization>() {
        Ok(Normalization::Local { window }) if window < 2 => Err(invalid(
            "analysis",
            "normalization",
            "local window must be at least 2",
        )),
        Ok(_) => Ok(()),
        Err(e) => Err(invalid("analysis", "normalization", e)),
    }
}

fn validate_intervals(config: &dyn ConfigPort) -> Result<(), CorrError> {
    for item in config.get_list("analysis", "intervals") {
        item.parse::<Interval>()
            .map_err(|e| invalid("analysis", "intervals", e))?;
    }
    Ok(())
}

fn validate_years(config: &dyn ConfigPort) -> Result<(), CorrError> {
    for item in config.get_list("analysis", "years") {
        item.parse::<i32>()
            .map_err(|_| invalid("analysis", "years", format!("'{}' is not a year", item)))?;
    }
    Ok(())
}

fn validate_block_size(config: &dyn ConfigPort) -> Result<(), CorrError> {
    validate_integer(config, "analysis", "block_size")?;
    let value = config.get_int("analysis", "block_size", 0);
    if value < 0 || value == 1 {
        return Err(invalid(
            "analysis",
            "block_size",
            "block_size must be 0 (disabled) or at least 2",
        ));
    }
    Ok(())
}

fn validate_histogram(config: &dyn ConfigPort) -> Result<(), CorrError> {
    validate_integer(config, "analysis", "bins")?;
    if config.get_int("analysis", "bins", 1) < 1 {
        return Err(invalid("analysis", "bins", "bins must be at least 1"));
    }

    let lo = config.get_double("analysis", "histogram_min", -5.0);
    let hi = config.get_double("analysis", "histogram_max", 5.0);
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(invalid(
            "analysis",
            "histogram_min",
            "histogram_min must be below histogram_max",
        ));
    }
    Ok(())
}
