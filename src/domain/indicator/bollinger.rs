//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0.
//! Each band has len - period + 1 values; fewer than `period` prices gives
//! empty bands.

use serde::Serialize;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_STDDEV: f64 = 2.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    pub fn is_empty(&self) -> bool {
        self.middle.is_empty()
    }
}

pub fn bollinger_bands(prices: &[f64], period: usize, stddev_mult: f64) -> BollingerBands {
    if period == 0 || prices.len() < period {
        return BollingerBands::default();
    }

    let mut bands = BollingerBands::default();

    for window in prices.windows(period) {
        let middle = window.iter().sum::<f64>() / period as f64;
        let stddev = population_stddev(window, middle);

        bands.upper.push(middle + stddev_mult * stddev);
        bands.middle.push(middle);
        bands.lower.push(middle - stddev_mult * stddev);
    }

    bands
}

/// Population standard deviation of `window` around `mean`.
pub fn population_stddev(window: &[f64], mean: f64) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let variance = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / window.len() as f64;
    variance.sqrt()
}
