//! Technical indicator library.
//!
//! Pure functions over price arrays. Short input never errors: each function
//! degrades to an empty (or partially defined) output, and callers treat an
//! empty result as "indicator unavailable".

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod pivot;
pub mod rsi;
pub mod signals;

pub use bollinger::{BollingerBands, bollinger_bands, population_stddev};
pub use ema::{ema, sma};
pub use macd::{Macd, MacdPoint, macd, macd_with};
pub use pivot::{
    DEFAULT_LOOKBACK, KeyLevels, Pivot, PivotPoints, Trendline, Trendlines, key_levels,
    pivot_highs, pivot_lows, pivot_points, trendlines,
};
pub use rsi::{DEFAULT_PERIOD as DEFAULT_RSI_PERIOD, rsi};
pub use signals::{TechnicalSignals, Trend, VolumeProfile, VolumeTrend, technical_signals};
