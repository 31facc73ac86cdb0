//! Configuration validation.
//!
//! Checks every `[backtest]` and `[advisory]` key before a run so that a bad
//! file fails fast with the offending key named.

use crate::domain::error::TraderError;
use crate::domain::risk::{MAX_RISK_PERCENTAGE, MIN_RISK_PERCENTAGE};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_symbol(config)?;
    validate_initial_capital(config)?;
    validate_dates(config)?;
    validate_analysis(config)?;
    validate_min_confidence(config)?;
    validate_default_risk(config)?;
    Ok(())
}

pub fn validate_advisory_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for key in ["max_retries", "initial_backoff_ms", "min_interval_ms"] {
        if config.get_int("advisory", key, 0) < 0 {
            return Err(invalid("advisory", key, format!("{key} must be non-negative")));
        }
    }
    if config.get_int("advisory", "timeout_ms", 5000) <= 0 {
        return Err(invalid("advisory", "timeout_ms", "timeout_ms must be positive"));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("backtest", "symbol") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "symbol".to_string(),
        }),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double("backtest", "initial_capital", 0.0);
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

/// Read a required `[backtest]` date in `YYYY-MM-DD` form.
pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, TraderError> {
    match config.get_string("backtest", field) {
        None => Err(TraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                format!("invalid {field} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

fn validate_analysis(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if config.get_int("backtest", "warmup_bars", 50) < 0 {
        return Err(invalid(
            "backtest",
            "warmup_bars",
            "warmup_bars must be non-negative",
        ));
    }
    if config.get_int("backtest", "analysis_interval", 1) < 1 {
        return Err(invalid(
            "backtest",
            "analysis_interval",
            "analysis_interval must be at least 1",
        ));
    }
    if config.get_int("backtest", "analysis_window", 100) < 2 {
        return Err(invalid(
            "backtest",
            "analysis_window",
            "analysis_window must be at least 2",
        ));
    }
    Ok(())
}

fn validate_min_confidence(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double("backtest", "min_confidence", 75.0);
    if !(0.0..=100.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "min_confidence",
            "min_confidence must be between 0 and 100",
        ));
    }
    Ok(())
}

fn validate_default_risk(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double("backtest", "default_risk_percentage", 1.0);
    if !(MIN_RISK_PERCENTAGE..=MAX_RISK_PERCENTAGE).contains(&value) {
        return Err(invalid(
            "backtest",
            "default_risk_percentage",
            format!(
                "default_risk_percentage must be between {MIN_RISK_PERCENTAGE} and {MAX_RISK_PERCENTAGE}"
            ),
        ));
    }
    Ok(())
}
