//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9. All three series share the
//! input length since the underlying EMAs are seeded with the first value.

use serde::Serialize;

use crate::domain::indicator::ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// One MACD sample, usually the latest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl Macd {
    pub fn last(&self) -> Option<MacdPoint> {
        Some(MacdPoint {
            line: *self.line.last()?,
            signal: *self.signal.last()?,
            histogram: *self.histogram.last()?,
        })
    }
}

pub fn macd(prices: &[f64]) -> Macd {
    macd_with(prices, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

pub fn macd_with(prices: &[f64], fast: usize, slow: usize, signal_period: usize) -> Macd {
    if prices.is_empty() {
        return Macd::default();
    }

    let ema_fast = ema(prices, fast);
    let ema_slow = ema(prices, slow);

    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&line, signal_period);
    let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

    Macd {
        line,
        signal,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn macd_empty() {
        let m = macd(&[]);
        assert!(m.line.is_empty());
        assert!(m.last().is_none());
    }

    #[test]
    fn macd_lengths_match_input() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let m = macd(&prices);
        assert_eq!(m.line.len(), 40);
        assert_eq!(m.signal.len(), 40);
        assert_eq!(m.histogram.len(), 40);
    }

    #[test]
    fn macd_starts_at_zero() {
        let m = macd(&[100.0, 101.0, 102.0]);
        assert_relative_eq!(m.line[0], 0.0);
        assert_relative_eq!(m.signal[0], 0.0);
    }

    #[test]
    fn macd_line_is_ema_difference() {
        let prices: Vec<f64> = (0..30).map(|i| 50.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let m = macd(&prices);
        let fast = ema(&prices, 12);
        let slow = ema(&prices, 26);
        for i in 0..prices.len() {
            assert_relative_eq!(m.line[i], fast[i] - slow[i], epsilon = 1e-12);
            assert_relative_eq!(m.histogram[i], m.line[i] - m.signal[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + 2.0 * i as f64).collect();
        let last = macd(&prices).last().unwrap();
        assert!(last.line > 0.0);
        assert!(last.histogram > 0.0);
    }
}
