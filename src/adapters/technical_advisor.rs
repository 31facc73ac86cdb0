//! Deterministic rule-based advisor.
//!
//! Stands in for the external advisory service so that runs are reproducible.
//! Three setups are recognised, in priority order: a range breakout, a
//! pullback to EMA(20) inside an established trend, and a mean-reversion
//! extreme (close outside the Bollinger bands, or RSI beyond 30/70 on the
//! matching side of the middle band). Entry is the last close, the stop
//! sits just beyond the nearest pivot level and the target is placed at 2R.

use crate::domain::error::TraderError;
use crate::domain::indicator::bollinger::{DEFAULT_PERIOD, DEFAULT_STDDEV};
use crate::domain::indicator::{KeyLevels, TechnicalSignals, Trend, VolumeTrend, bollinger_bands, ema};
use crate::domain::ohlcv::{Bar, closes};
use crate::domain::position::Side;
use crate::domain::recommendation::{Action, Recommendation, SignalFlags, TradeSuggestion};
use crate::ports::advisory_port::{AdvisoryPort, AnalysisRequest};

pub const MIN_HISTORY: usize = 21;
const BREAKOUT_LOOKBACK: usize = 20;
const PULLBACK_TOLERANCE_PCT: f64 = 0.5;
const STOP_BUFFER_PCT: f64 = 0.1;
const FALLBACK_STOP_BARS: usize = 10;
const TARGET_R_MULTIPLE: f64 = 2.0;
const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

const BASE_CONFIDENCE: f64 = 50.0;
const PER_SIGNAL_CONFIDENCE: f64 = 15.0;
const STRENGTH_CONFIDENCE: f64 = 20.0;
const MAX_CONFIDENCE: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TechnicalAdvisor {
    risk_percentage: f64,
}

impl TechnicalAdvisor {
    pub fn new(risk_percentage: f64) -> Self {
        TechnicalAdvisor { risk_percentage }
    }

    pub fn recommend(&self, bars: &[Bar], signals: &TechnicalSignals) -> Recommendation {
        let key_levels = KeyLevels {
            support: signals.support.clone(),
            resistance: signals.resistance.clone(),
        };
        let neutral = |reasoning: &str| Recommendation {
            trend: signals.trend,
            confidence: BASE_CONFIDENCE,
            key_levels: key_levels.clone(),
            signals: SignalFlags::default(),
            recommendation: TradeSuggestion::hold(reasoning),
            patterns: Vec::new(),
        };

        let Some(last) = bars.last() else {
            return neutral("no bars");
        };
        if bars.len() < MIN_HISTORY {
            return neutral("insufficient history");
        }

        let breakout = breakout_direction(bars, signals);
        let pullback = pullback_direction(bars, signals);
        let reversion = mean_reversion_direction(bars, signals);

        let flags = SignalFlags {
            ema_pullback: pullback.is_some(),
            mean_reversion: reversion.is_some(),
            breakout: breakout.is_some(),
        };
        let patterns: Vec<String> = [
            (breakout, "breakout"),
            (pullback, "ema_pullback"),
            (reversion, "mean_reversion"),
        ]
        .iter()
        .filter_map(|(dir, name)| dir.map(|side| format!("{name}_{side}")))
        .collect();

        let Some(side) = breakout.or(pullback).or(reversion) else {
            return Recommendation {
                signals: flags,
                patterns,
                ..neutral("no setup")
            };
        };

        let agreeing = [breakout, pullback, reversion]
            .iter()
            .filter(|d| **d == Some(side))
            .count();
        let confidence = (BASE_CONFIDENCE
            + PER_SIGNAL_CONFIDENCE * agreeing as f64
            + STRENGTH_CONFIDENCE * signals.strength)
            .min(MAX_CONFIDENCE);

        let entry = last.close;
        let Some(stop) = stop_level(side, entry, bars, signals) else {
            return Recommendation {
                signals: flags,
                patterns,
                ..neutral("no protective level")
            };
        };
        let target = entry + side.sign() * TARGET_R_MULTIPLE * (entry - stop).abs();
        if target <= 0.0 {
            return Recommendation {
                signals: flags,
                patterns,
                ..neutral("target below zero")
            };
        }

        let action = match side {
            Side::Long => Action::Buy,
            Side::Short => Action::Sell,
        };

        Recommendation {
            trend: signals.trend,
            confidence,
            key_levels,
            signals: flags,
            recommendation: TradeSuggestion {
                action,
                entry_price: Some(entry),
                stop_loss: Some(stop),
                take_profit: Some(target),
                risk_percentage: Some(self.risk_percentage),
                reasoning: Some(patterns.join(", ")),
            },
            patterns,
        }
    }
}

impl Default for TechnicalAdvisor {
    fn default() -> Self {
        TechnicalAdvisor::new(1.0)
    }
}

impl AdvisoryPort for TechnicalAdvisor {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Recommendation, TraderError> {
        Ok(self.recommend(request.window, request.technical_signals))
    }
}

/// Close beyond the extreme of the previous bars, confirmed by rising volume.
fn breakout_direction(bars: &[Bar], signals: &TechnicalSignals) -> Option<Side> {
    if signals.volume.trend != VolumeTrend::Increasing {
        return None;
    }
    let (last, prior) = bars.split_last()?;
    let prior = &prior[prior.len().saturating_sub(BREAKOUT_LOOKBACK)..];
    let range_high = prior.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let range_low = prior.iter().map(|b| b.low).fold(f64::MAX, f64::min);

    if last.close > range_high {
        Some(Side::Long)
    } else if last.close < range_low {
        Some(Side::Short)
    } else {
        None
    }
}

/// The last bar tagged EMA(20) and closed back on the trend side of it.
fn pullback_direction(bars: &[Bar], signals: &TechnicalSignals) -> Option<Side> {
    let last = bars.last()?;
    let fast = *ema(&closes(bars), 20).last()?;
    let tolerance = fast * PULLBACK_TOLERANCE_PCT / 100.0;

    match signals.trend {
        Trend::Bullish if last.low <= fast + tolerance && last.close > fast => Some(Side::Long),
        Trend::Bearish if last.high >= fast - tolerance && last.close < fast => Some(Side::Short),
        _ => None,
    }
}

fn mean_reversion_direction(bars: &[Bar], signals: &TechnicalSignals) -> Option<Side> {
    let last = bars.last()?.close;
    let bands = bollinger_bands(&closes(bars), DEFAULT_PERIOD, DEFAULT_STDDEV);
    let below_band = bands.lower.last().is_some_and(|&lower| last < lower);
    let above_band = bands.upper.last().is_some_and(|&upper| last > upper);
    let middle = bands.middle.last().copied().unwrap_or(last);
    let oversold = last < middle && signals.rsi.is_some_and(|r| r < RSI_OVERSOLD);
    let overbought = last > middle && signals.rsi.is_some_and(|r| r > RSI_OVERBOUGHT);

    if below_band || oversold {
        Some(Side::Long)
    } else if above_band || overbought {
        Some(Side::Short)
    } else {
        None
    }
}

/// Just beyond the nearest pivot level on the losing side, falling back to
/// the recent swing extreme. `None` when no level lies on the correct side.
fn stop_level(side: Side, entry: f64, bars: &[Bar], signals: &TechnicalSignals) -> Option<f64> {
    let buffer = 1.0 - side.sign() * STOP_BUFFER_PCT / 100.0;
    let recent = &bars[bars.len().saturating_sub(FALLBACK_STOP_BARS)..];

    let level = match side {
        Side::Long => signals
            .support
            .first()
            .copied()
            .or_else(|| Some(recent.iter().map(|b| b.low).fold(f64::MAX, f64::min))),
        Side::Short => signals
            .resistance
            .first()
            .copied()
            .or_else(|| Some(recent.iter().map(|b| b.high).fold(f64::MIN, f64::max))),
    }?;

    let stop = level * buffer;
    let on_losing_side = match side {
        Side::Long => stop < entry,
        Side::Short => stop > entry,
    };
    (on_losing_side && stop > 0.0).then_some(stop)
}
