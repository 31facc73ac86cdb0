//! Swing pivots, trendlines and key support/resistance levels.
//!
//! A bar is a pivot high (low) when its high (low) is strictly the extreme of
//! the 2·lookback+1 bars centred on it. Bars closer than `lookback` to either
//! end of the series can never be pivots.

use serde::{Deserialize, Serialize};

use crate::domain::ohlcv::Bar;

pub const DEFAULT_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PivotPoints {
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
}

/// A naive two-point line between consecutive pivots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trendline {
    pub start: Pivot,
    pub end: Pivot,
}

impl Trendline {
    pub fn slope(&self) -> f64 {
        let run = self.end.index as f64 - self.start.index as f64;
        if run == 0.0 {
            return 0.0;
        }
        (self.end.price - self.start.price) / run
    }

    /// Price of the extended line at bar `index`.
    pub fn value_at(&self, index: usize) -> f64 {
        self.start.price + self.slope() * (index as f64 - self.start.index as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trendlines {
    pub support: Vec<Trendline>,
    pub resistance: Vec<Trendline>,
}

/// Support below and resistance above a reference price, nearest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyLevels {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

impl KeyLevels {
    pub fn nearest_support(&self) -> Option<f64> {
        self.support.first().copied()
    }

    pub fn nearest_resistance(&self) -> Option<f64> {
        self.resistance.first().copied()
    }
}

pub fn pivot_highs(bars: &[Bar], lookback: usize) -> Vec<Pivot> {
    find_pivots(bars, lookback, |b| b.high, |candidate, other| candidate > other)
}

pub fn pivot_lows(bars: &[Bar], lookback: usize) -> Vec<Pivot> {
    find_pivots(bars, lookback, |b| b.low, |candidate, other| candidate < other)
}

fn find_pivots(
    bars: &[Bar],
    lookback: usize,
    price: impl Fn(&Bar) -> f64,
    beats: impl Fn(f64, f64) -> bool,
) -> Vec<Pivot> {
    if lookback == 0 || bars.len() < 2 * lookback + 1 {
        return Vec::new();
    }

    (lookback..bars.len() - lookback)
        .filter_map(|i| {
            let candidate = price(&bars[i]);
            let is_pivot = (i - lookback..=i + lookback)
                .filter(|&j| j != i)
                .all(|j| beats(candidate, price(&bars[j])));
            is_pivot.then_some(Pivot {
                index: i,
                price: candidate,
            })
        })
        .collect()
}

pub fn pivot_points(bars: &[Bar], lookback: usize) -> PivotPoints {
    PivotPoints {
        highs: pivot_highs(bars, lookback).iter().map(|p| p.price).collect(),
        lows: pivot_lows(bars, lookback).iter().map(|p| p.price).collect(),
    }
}

pub fn trendlines(bars: &[Bar]) -> Trendlines {
    let connect = |pivots: Vec<Pivot>| -> Vec<Trendline> {
        pivots
            .windows(2)
            .map(|w| Trendline {
                start: w[0],
                end: w[1],
            })
            .collect()
    };

    Trendlines {
        support: connect(pivot_lows(bars, DEFAULT_LOOKBACK)),
        resistance: connect(pivot_highs(bars, DEFAULT_LOOKBACK)),
    }
}

/// Pivot lows below `price` become support, pivot highs above it resistance.
/// Duplicate levels are collapsed.
pub fn key_levels(bars: &[Bar], lookback: usize, price: f64) -> KeyLevels {
    let pivots = pivot_points(bars, lookback);

    let mut support: Vec<f64> = pivots.lows.into_iter().filter(|&l| l < price).collect();
    support.sort_by(|a, b| b.total_cmp(a));
    support.dedup();

    let mut resistance: Vec<f64> = pivots.highs.into_iter().filter(|&h| h > price).collect();
    resistance.sort_by(|a, b| a.total_cmp(b));
    resistance.dedup();

    KeyLevels {
        support,
        resistance,
    }
}
