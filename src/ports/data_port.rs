//! Market data provider port trait.

use chrono::NaiveDate;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;

pub trait MarketDataPort {
    /// Bars for `symbol` ascending by timestamp, at most `limit` of the most
    /// recent ones inside the optional `[start, end]` window.
    ///
    /// Fails with [`TraderError::DataUnavailable`] when the venue has no data.
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: Option<usize>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, TraderError>;
}
