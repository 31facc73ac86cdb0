//! Advisory analysis service port trait.

use crate::domain::error::TraderError;
use crate::domain::indicator::TechnicalSignals;
use crate::domain::ohlcv::Bar;
use crate::domain::position::Trade;
use crate::domain::recommendation::Recommendation;

/// Everything the advisory service is shown for one decision.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub symbol: &'a str,
    pub timeframe: &'a str,
    pub balance: f64,
    pub open_positions: &'a [Trade],
    pub technical_signals: &'a TechnicalSignals,
    /// Trailing window ending at the bar being simulated.
    pub window: &'a [Bar],
}

/// An opaque, possibly slow and non-deterministic source of recommendations.
#[allow(async_fn_in_trait)]
pub trait AdvisoryPort {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Recommendation, TraderError>;
}
