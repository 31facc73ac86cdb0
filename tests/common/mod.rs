#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use vtrader::domain::backtest::{BacktestConfig, CancelHandle};
use vtrader::domain::error::TraderError;
use vtrader::domain::indicator::Trend;
pub use vtrader::domain::ohlcv::Bar;
use vtrader::domain::recommendation::{Action, Recommendation, SignalFlags, TradeSuggestion};
use vtrader::ports::advisory_port::{AdvisoryPort, AnalysisRequest};

pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(i as i64)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(i: usize, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: ts(i),
        open: close,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

/// Every bar has identical OHLC.
pub fn flat_bars(count: usize, price: f64) -> Vec<Bar> {
    (0..count).map(|i| make_bar(i, price, price, price)).collect()
}

/// Close 90 + i with a half-point range either side.
pub fn rising_bars(count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let close = 90.0 + i as f64;
            make_bar(i, close + 0.5, close - 0.5, close)
        })
        .collect()
}

/// Deterministic zig-zag around 100 with a period of 12 bars.
pub fn zigzag_bars(count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let phase = (i % 12) as f64;
            let swing = if phase < 6.0 { phase } else { 12.0 - phase };
            let close = 97.0 + swing * 1.5;
            make_bar(i, close + 1.0, close - 1.0, close)
        })
        .collect()
}

/// Covers every timestamp produced by `ts`.
pub fn config(warmup_bars: usize) -> BacktestConfig {
    BacktestConfig {
        symbol: "AAPL".into(),
        timeframe: "1d".into(),
        start_date: date(2024, 1, 1),
        end_date: date(2025, 12, 31),
        initial_balance: 100_000.0,
        warmup_bars,
        analysis_interval: 1,
        analysis_window: 50,
        min_confidence: 75.0,
        default_risk_percentage: 1.0,
        manage_positions: false,
    }
}

pub fn hold_recommendation() -> Recommendation {
    Recommendation {
        trend: Trend::Neutral,
        confidence: 90.0,
        key_levels: Default::default(),
        signals: SignalFlags::default(),
        recommendation: TradeSuggestion::hold("no setup"),
        patterns: vec![],
    }
}

pub fn buy_recommendation(
    entry: f64,
    stop: f64,
    target: f64,
    risk: f64,
    confidence: f64,
) -> Recommendation {
    Recommendation {
        trend: Trend::Bullish,
        confidence,
        key_levels: Default::default(),
        signals: SignalFlags {
            breakout: true,
            ..SignalFlags::default()
        },
        recommendation: TradeSuggestion {
            action: Action::Buy,
            entry_price: Some(entry),
            stop_loss: Some(stop),
            take_profit: Some(target),
            risk_percentage: Some(risk),
            reasoning: Some("scripted".into()),
        },
        patterns: vec![],
    }
}

fn current<'a>(request: &AnalysisRequest<'a>) -> &'a Bar {
    request.window.last().expect("analysis window is never empty")
}

/// Holds unless a recommendation was scripted for the current bar.
#[derive(Default)]
pub struct ScriptedAdvisor {
    pub script: HashMap<NaiveDateTime, Recommendation>,
    pub calls: AtomicUsize,
    pub seen_balances: Mutex<Vec<f64>>,
}

impl ScriptedAdvisor {
    pub fn with(mut self, bar: usize, rec: Recommendation) -> Self {
        self.script.insert(ts(bar), rec);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AdvisoryPort for ScriptedAdvisor {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Recommendation, TraderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_balances.lock().unwrap().push(request.balance);
        Ok(self
            .script
            .get(&current(request).timestamp)
            .cloned()
            .unwrap_or_else(hold_recommendation))
    }
}

/// Buys every bar at the close with a 5% stop and a 10% target.
pub struct AlwaysBuyAdvisor {
    pub risk: f64,
}

impl AdvisoryPort for AlwaysBuyAdvisor {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Recommendation, TraderError> {
        let close = current(request).close;
        Ok(buy_recommendation(
            close,
            close * 0.95,
            close * 1.10,
            self.risk,
            90.0,
        ))
    }
}

pub struct FailingAdvisor;

impl AdvisoryPort for FailingAdvisor {
    async fn analyze(&self, _: &AnalysisRequest<'_>) -> Result<Recommendation, TraderError> {
        Err(TraderError::AdvisoryUnavailable {
            reason: "service timed out".into(),
        })
    }
}

/// Holds, and fires the cancel handle on call number `cancel_on`.
pub struct CancellingAdvisor {
    pub cancel: CancelHandle,
    pub cancel_on: usize,
    pub calls: AtomicUsize,
}

impl AdvisoryPort for CancellingAdvisor {
    async fn analyze(&self, _: &AnalysisRequest<'_>) -> Result<Recommendation, TraderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.cancel_on {
            self.cancel.cancel();
        }
        Ok(hold_recommendation())
    }
}
