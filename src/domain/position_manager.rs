//! Position manager: per-position stop trailing, close signals and scaled
//! take-profit ladders.
//!
//! Evaluation never mutates the position. It returns a [`PositionDecision`]
//! that the caller applies (directly in a backtest, or through an
//! [`ExecutionPort`](crate::ports::execution_port::ExecutionPort) live).

use serde::Serialize;

use crate::domain::indicator::{DEFAULT_LOOKBACK, KeyLevels, key_levels};
use crate::domain::ohlcv::Bar;
use crate::domain::position::{Side, Trade};
use crate::domain::risk::validate_stop_loss_modification;

pub const STOP_SEARCH_BARS: usize = 10;
pub const MIN_ADJUSTMENT_CONFIDENCE: f64 = 70.0;
pub const MIN_LIVE_RISK_REWARD: f64 = 0.5;
pub const LEVEL_BUFFER_PCT: f64 = 0.5;

const MOVEMENT_POINTS: f64 = 40.0;
const IMPROVEMENT_POINTS: f64 = 30.0;
const VOLUME_POINTS: f64 = 30.0;
const VOLUME_BARS: usize = 3;

const LADDER_MULTIPLES: [f64; 3] = [1.0, 2.0, 3.0];
const LADDER_FRACTIONS: [f64; 2] = [0.4, 0.3];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopAdjustment {
    pub new_stop: f64,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TakeProfitLevel {
    pub price: f64,
    pub size: u64,
    pub risk_multiple: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Open,
    StopAdjusted,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionDecision {
    pub close: Option<String>,
    pub stop_adjustment: Option<StopAdjustment>,
    pub take_profits: Vec<TakeProfitLevel>,
}

impl PositionDecision {
    pub fn state(&self) -> PositionState {
        if self.close.is_some() {
            PositionState::Closed
        } else if self.stop_adjustment.is_some() {
            PositionState::StopAdjusted
        } else {
            PositionState::Open
        }
    }
}

pub fn evaluate(position: &Trade, bars: &[Bar]) -> PositionDecision {
    let levels = key_levels(bars, DEFAULT_LOOKBACK, position.entry_price);
    let take_profits = take_profit_ladder(position, &levels);

    let Some(current) = bars.last().map(|b| b.close) else {
        return PositionDecision {
            close: None,
            stop_adjustment: None,
            take_profits,
        };
    };

    if let Some(reason) = close_signal(position, &levels, current) {
        return PositionDecision {
            close: Some(reason),
            stop_adjustment: None,
            take_profits,
        };
    }

    PositionDecision {
        close: None,
        stop_adjustment: stop_adjustment(position, bars, current),
        take_profits,
    }
}

/// Live risk-reward: distance travelled from entry in units of stop distance.
pub fn live_risk_reward(position: &Trade, current: f64) -> f64 {
    let risk = (position.entry_price - position.stop_loss).abs();
    if risk == 0.0 {
        return f64::INFINITY;
    }
    (current - position.entry_price).abs() / risk
}

fn close_signal(position: &Trade, levels: &KeyLevels, current: f64) -> Option<String> {
    let breached = match position.side {
        Side::Long => levels.nearest_support().filter(|&s| current < s),
        Side::Short => levels.nearest_resistance().filter(|&r| current > r),
    };
    if let Some(level) = breached {
        return Some(format!("price {current:.2} breached key level {level:.2}"));
    }

    let ratio = live_risk_reward(position, current);
    if ratio < MIN_LIVE_RISK_REWARD {
        return Some(format!(
            "risk-reward {ratio:.2} below {MIN_LIVE_RISK_REWARD}"
        ));
    }

    None
}

fn stop_adjustment(position: &Trade, bars: &[Bar], current: f64) -> Option<StopAdjustment> {
    let recent = &bars[bars.len().saturating_sub(STOP_SEARCH_BARS)..];
    let candidate = swing_stop_candidate(position, recent, current)?;

    let confidence = adjustment_confidence(position, bars, current, candidate);
    if confidence < MIN_ADJUSTMENT_CONFIDENCE {
        log::debug!(
            "{} stop candidate {candidate:.2} rejected: confidence {confidence:.0}",
            position.symbol
        );
        return None;
    }

    let validation = validate_stop_loss_modification(position, candidate);
    if !validation.is_valid {
        log::debug!(
            "{} stop candidate {candidate:.2} rejected: {}",
            position.symbol,
            validation.reason.unwrap_or_default()
        );
        return None;
    }

    let swing = match position.side {
        Side::Long => "higher low",
        Side::Short => "lower high",
    };
    Some(StopAdjustment {
        new_stop: candidate,
        confidence,
        reason: format!("trail stop to {swing} at {candidate:.2}"),
    })
}

/// Best local swing in `recent` that tightens the stop without crossing price:
/// the highest swing low for longs, the lowest swing high for shorts.
fn swing_stop_candidate(position: &Trade, recent: &[Bar], current: f64) -> Option<f64> {
    if recent.len() < 3 {
        return None;
    }

    let swings = recent.windows(3).filter_map(|w| match position.side {
        Side::Long => (w[1].low < w[0].low && w[1].low < w[2].low).then_some(w[1].low),
        Side::Short => (w[1].high > w[0].high && w[1].high > w[2].high).then_some(w[1].high),
    });

    match position.side {
        Side::Long => swings
            .filter(|&low| low > position.stop_loss && low < current)
            .max_by(f64::total_cmp),
        Side::Short => swings
            .filter(|&high| high < position.stop_loss && high > current)
            .min_by(f64::total_cmp),
    }
}

/// Confidence (0-100) from favourable movement, stop improvement and volume.
pub fn adjustment_confidence(position: &Trade, bars: &[Bar], current: f64, new_stop: f64) -> f64 {
    let risk = (position.entry_price - position.stop_loss).abs();
    if risk == 0.0 {
        return 0.0;
    }

    let movement_r = position.side.sign() * (current - position.entry_price) / risk;
    let movement = (movement_r / 2.0).clamp(0.0, 1.0) * MOVEMENT_POINTS;

    let improvement_r = (new_stop - position.stop_loss).abs() / risk;
    let improvement = improvement_r.clamp(0.0, 1.0) * IMPROVEMENT_POINTS;

    movement + improvement + volume_confirmation(bars)
}

fn volume_confirmation(bars: &[Bar]) -> f64 {
    if bars.len() < 2 * VOLUME_BARS {
        return 0.0;
    }
    let tail = &bars[bars.len() - 2 * VOLUME_BARS..];
    let prior: f64 = tail[..VOLUME_BARS].iter().map(|b| b.volume).sum();
    let recent: f64 = tail[VOLUME_BARS..].iter().map(|b| b.volume).sum();
    if prior <= 0.0 {
        return 0.0;
    }
    let growth = recent / prior - 1.0;
    (growth / 0.5).clamp(0.0, 1.0) * VOLUME_POINTS
}

/// Targets at 1R, 2R and 3R from entry, sized 40/30/30, each clipped inside
/// the nearest opposing level when that level comes first. R is the initial
/// risk, so trailing the stop leaves the ladder in place.
pub fn take_profit_ladder(position: &Trade, levels: &KeyLevels) -> Vec<TakeProfitLevel> {
    let risk = position.initial_risk();

    let opposing = match position.side {
        Side::Long => levels
            .nearest_resistance()
            .map(|r| r * (1.0 - LEVEL_BUFFER_PCT / 100.0)),
        Side::Short => levels
            .nearest_support()
            .map(|s| s * (1.0 + LEVEL_BUFFER_PCT / 100.0)),
    };

    let first = (position.size as f64 * LADDER_FRACTIONS[0]).floor() as u64;
    let second = (position.size as f64 * LADDER_FRACTIONS[1]).floor() as u64;
    let sizes = [first, second, position.size - first - second];

    LADDER_MULTIPLES
        .iter()
        .zip(sizes)
        .map(|(&multiple, size)| {
            let raw = position.entry_price + position.side.sign() * multiple * risk;
            let price = match (position.side, opposing) {
                (Side::Long, Some(level)) if level < raw => level,
                (Side::Short, Some(level)) if level > raw => level,
                _ => raw,
            };
            TakeProfitLevel {
                price,
                size,
                risk_multiple: multiple,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(i as i64)
    }

    fn bar(i: usize, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: ts(i),
            open: close,
            high,
            low,
            close,
            volume,
        }
    }

    fn long(entry: f64, stop: f64, target: f64, size: u64) -> Trade {
        Trade::open("AAPL", Side::Long, entry, stop, target, size, 1.0, ts(0)).unwrap()
    }

    /// Rally from 100 to ~112 with a pullback low at 106 and rising volume.
    fn rally_with_pullback() -> Vec<Bar> {
        let mut bars = Vec::new();
        let closes = [100.0, 102.0, 104.0, 106.0, 108.0, 109.0, 107.0, 108.0, 110.0, 112.0];
        let lows = [99.0, 101.0, 103.0, 105.0, 107.0, 108.0, 106.0, 107.0, 109.0, 111.0];
        let volumes = [1000.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0, 2000.0, 2000.0, 2000.0];
        for i in 0..closes.len() {
            bars.push(bar(i, closes[i] + 1.0, lows[i], closes[i], volumes[i]));
        }
        bars
    }

    #[test]
    fn adjusts_stop_to_higher_low() {
        let pos = long(100.0, 95.0, 120.0, 100);
        let decision = evaluate(&pos, &rally_with_pullback());

        assert_eq!(decision.state(), PositionState::StopAdjusted);
        let adj = decision.stop_adjustment.unwrap();
        assert_relative_eq!(adj.new_stop, 106.0);
        assert!(adj.confidence >= MIN_ADJUSTMENT_CONFIDENCE);
    }

    #[test]
    fn no_adjustment_without_volume_or_movement() {
        let pos = long(100.0, 95.0, 120.0, 100);
        let mut bars = rally_with_pullback();
        for b in &mut bars {
            b.volume = 1000.0;
        }
        // movement 2.4R -> 40, improvement 11/5 -> 30, volume 0 -> 70 total
        let decision = evaluate(&pos, &bars);
        assert!(decision.stop_adjustment.is_some());

        let far_stop = long(100.0, 80.0, 140.0, 100);
        // movement 0.6R -> 12, improvement 26/20 -> 30, volume 0 -> 42
        let decision = evaluate(&far_stop, &bars);
        assert_eq!(decision.state(), PositionState::Open);
    }

    #[test]
    fn closes_when_live_risk_reward_deteriorates() {
        let pos = long(100.0, 90.0, 120.0, 100);
        let bars: Vec<Bar> = (0..5).map(|i| bar(i, 102.0, 99.0, 101.0, 1000.0)).collect();
        let decision = evaluate(&pos, &bars);

        assert_eq!(decision.state(), PositionState::Closed);
        assert!(decision.close.unwrap().contains("risk-reward"));
    }

    #[test]
    fn closes_when_support_breached() {
        // Pivot low at 97 (index 5) below the entry, then a drop to 96.
        let mut bars = Vec::new();
        let lows = [99.0, 99.5, 99.0, 98.5, 98.0, 97.0, 98.0, 98.5, 99.0, 99.5, 100.0, 96.5];
        for (i, &low) in lows.iter().enumerate() {
            let close = if i == lows.len() - 1 { 96.0 } else { low + 1.0 };
            bars.push(bar(i, low + 2.0, low, close, 1000.0));
        }
        let pos = long(100.0, 90.0, 130.0, 100);
        let decision = evaluate(&pos, &bars);

        assert!(decision.close.unwrap().contains("breached"));
    }

    #[test]
    fn ladder_sizes_absorb_remainder() {
        let pos = long(100.0, 95.0, 115.0, 101);
        let ladder = take_profit_ladder(&pos, &KeyLevels::default());

        assert_eq!(ladder.len(), 3);
        assert_eq!(ladder[0].size, 40);
        assert_eq!(ladder[1].size, 30);
        assert_eq!(ladder[2].size, 31);
        assert_relative_eq!(ladder[0].price, 105.0);
        assert_relative_eq!(ladder[1].price, 110.0);
        assert_relative_eq!(ladder[2].price, 115.0);
    }

    #[test]
    fn ladder_clipped_inside_resistance() {
        let pos = long(100.0, 95.0, 115.0, 100);
        let levels = KeyLevels {
            support: vec![],
            resistance: vec![108.0],
        };
        let ladder = take_profit_ladder(&pos, &levels);

        assert_relative_eq!(ladder[0].price, 105.0);
        assert_relative_eq!(ladder[1].price, 108.0 * 0.995);
        assert_relative_eq!(ladder[2].price, 108.0 * 0.995);
    }

    #[test]
    fn ladder_short_clipped_inside_support() {
        let pos = Trade::open("AAPL", Side::Short, 100.0, 105.0, 85.0, 10, 1.0, ts(0)).unwrap();
        let levels = KeyLevels {
            support: vec![93.0],
            resistance: vec![],
        };
        let ladder = take_profit_ladder(&pos, &levels);

        assert_relative_eq!(ladder[0].price, 95.0);
        assert_relative_eq!(ladder[1].price, 93.0 * 1.005);
        assert_eq!(ladder.iter().map(|l| l.size).sum::<u64>(), 10);
    }

    #[test]
    fn ladder_ignores_trailed_stop() {
        let mut pos = long(100.0, 95.0, 120.0, 100);
        pos.stop_loss = 106.0;
        let ladder = take_profit_ladder(&pos, &KeyLevels::default());

        let prices: Vec<f64> = ladder.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![105.0, 110.0, 115.0]);
        assert!(ladder.iter().all(|l| l.price != pos.stop_loss));
    }

    #[test]
    fn ladder_after_engine_applied_adjustment() {
        let mut pos = long(100.0, 95.0, 120.0, 100);
        let bars = rally_with_pullback();
        let adj = evaluate(&pos, &bars).stop_adjustment.unwrap();
        pos.stop_loss = adj.new_stop;

        let decision = evaluate(&pos, &bars);
        assert_relative_eq!(decision.take_profits[0].price, 105.0);
        assert_relative_eq!(decision.take_profits[2].price, 115.0);
    }

    #[test]
    fn empty_window_keeps_position_open() {
        let pos = long(100.0, 95.0, 115.0, 100);
        let decision = evaluate(&pos, &[]);
        assert_eq!(decision.state(), PositionState::Open);
        assert_eq!(decision.take_profits.len(), 3);
    }
}
