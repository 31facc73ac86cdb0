//! Technical signal snapshot for one analysis window.
//!
//! Trend compares the last close with EMA(20) and EMA(50); strength is the
//! EMA spread as a fraction of a 5% spread, clamped to [0, 1].

use serde::{Deserialize, Serialize};

use crate::domain::indicator::{
    DEFAULT_LOOKBACK, DEFAULT_RSI_PERIOD, MacdPoint, ema, key_levels, macd, rsi,
};
use crate::domain::ohlcv::{Bar, closes, volumes};

const FAST_TREND_PERIOD: usize = 20;
const SLOW_TREND_PERIOD: usize = 50;
const FULL_STRENGTH_SPREAD_PCT: f64 = 5.0;
const VOLUME_AVERAGE_PERIOD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeProfile {
    pub current: f64,
    pub average: f64,
    pub trend: VolumeTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalSignals {
    pub trend: Trend,
    pub strength: f64,
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<MacdPoint>,
    pub volume: VolumeProfile,
}

pub fn technical_signals(bars: &[Bar]) -> TechnicalSignals {
    let prices = closes(bars);
    let Some(&last_close) = prices.last() else {
        return TechnicalSignals {
            trend: Trend::Neutral,
            strength: 0.0,
            support: Vec::new(),
            resistance: Vec::new(),
            rsi: None,
            macd: None,
            volume: volume_profile(&[]),
        };
    };

    let fast = ema(&prices, FAST_TREND_PERIOD);
    let slow = ema(&prices, SLOW_TREND_PERIOD);
    let (fast_last, slow_last) = (fast[fast.len() - 1], slow[slow.len() - 1]);

    let trend = if last_close > fast_last && fast_last > slow_last {
        Trend::Bullish
    } else if last_close < fast_last && fast_last < slow_last {
        Trend::Bearish
    } else {
        Trend::Neutral
    };

    let strength = if slow_last > 0.0 {
        let spread_pct = (fast_last - slow_last).abs() / slow_last * 100.0;
        (spread_pct / FULL_STRENGTH_SPREAD_PCT).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let levels = key_levels(bars, DEFAULT_LOOKBACK, last_close);

    TechnicalSignals {
        trend,
        strength,
        support: levels.support,
        resistance: levels.resistance,
        rsi: rsi(&prices, DEFAULT_RSI_PERIOD).last().copied(),
        macd: macd(&prices).last(),
        volume: volume_profile(&volumes(bars)),
    }
}

fn volume_profile(volumes: &[f64]) -> VolumeProfile {
    let Some(&current) = volumes.last() else {
        return VolumeProfile {
            current: 0.0,
            average: 0.0,
            trend: VolumeTrend::Stable,
        };
    };

    let window = &volumes[volumes.len().saturating_sub(VOLUME_AVERAGE_PERIOD)..];
    let average = window.iter().sum::<f64>() / window.len() as f64;

    let trend = if current > average * 1.2 {
        VolumeTrend::Increasing
    } else if current < average * 0.8 {
        VolumeTrend::Decreasing
    } else {
        VolumeTrend::Stable
    };

    VolumeProfile {
        current,
        average,
        trend,
    }
}
