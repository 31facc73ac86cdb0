//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for vtrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid date range: start {start} must be before end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("no data available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("risk percentage {risk_percentage} outside [{min}, {max}]")]
    InvalidRiskParameter {
        risk_percentage: f64,
        min: f64,
        max: f64,
    },

    #[error("stop loss {stop_loss} is invalid for entry {entry_price}")]
    InvalidStopLoss { entry_price: f64, stop_loss: f64 },

    #[error("advisory service unavailable: {reason}")]
    AdvisoryUnavailable { reason: String },

    #[error("malformed recommendation field {field}: {reason}")]
    MalformedRecommendation { field: String, reason: String },

    #[error("backtest cancelled after {bars_processed} bars")]
    Cancelled { bars_processed: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    /// Fatal errors abort a run; everything else is local to one decision.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TraderError::ConfigParse { .. }
                | TraderError::ConfigMissing { .. }
                | TraderError::ConfigInvalid { .. }
                | TraderError::InvalidDateRange { .. }
                | TraderError::InsufficientData { .. }
                | TraderError::DataUnavailable { .. }
                | TraderError::Cancelled { .. }
                | TraderError::Io(_)
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Json(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::InvalidDateRange { .. } => 2,
            TraderError::InvalidRiskParameter { .. } | TraderError::InvalidStopLoss { .. } => 3,
            TraderError::AdvisoryUnavailable { .. }
            | TraderError::MalformedRecommendation { .. } => 4,
            TraderError::InsufficientData { .. } | TraderError::DataUnavailable { .. } => 5,
            TraderError::Cancelled { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
