//! Exponential and simple moving averages.
//!
//! EMA: k = 2/(n+1), seeded with the first price (not an SMA seed), then
//! EMA[i] = P[i]*k + EMA[i-1]*(1-k). Output is the same length as the input.
//!
//! SMA: rolling mean over n prices, output length len - n + 1.

pub fn ema(prices: &[f64], period: usize) -> Vec<f64> {
    let Some(&first) = prices.first() else {
        return Vec::new();
    };

    let k = 2.0 / (period.max(1) as f64 + 1.0);
    let mut values = Vec::with_capacity(prices.len());
    let mut current = first;
    values.push(current);

    for &price in &prices[1..] {
        current = price * k + current * (1.0 - k);
        values.push(current);
    }

    values
}

pub fn sma(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    prices
        .windows(period)
        .map(|window| window.iter().sum::<f64>() / period as f64)
        .collect()
}
