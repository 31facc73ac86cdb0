//! Result sink port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TraderError;

/// Accepts a finished run for persistence. The sink owns durability; callers
/// log a failure and move on.
pub trait ResultSink {
    fn store(&self, result: &BacktestResult) -> Result<(), TraderError>;
}
