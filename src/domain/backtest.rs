//! Backtest engine and per-bar event loop.
//!
//! A run moves through Initializing → Running → Finalizing → Done. Each bar
//! is applied in a fixed order (exits, optional position management, advisory
//! entry, equity update) and cancellation is only observed between bars.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::error::TraderError;
use super::execution::{TradeIntent, check_exits, decision_intents, submit};
use super::indicator::technical_signals;
use super::metrics::Statistics;
use super::ohlcv::Bar;
use super::portfolio::{EquityCurvePoint, Portfolio};
use super::position::{ExitReason, Side, Trade};
use super::position_manager::{self, TakeProfitLevel};
use super::risk::{RiskParameters, calculate_position_size, validate_new_position};
use crate::ports::advisory_port::{AdvisoryPort, AnalysisRequest};
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: String,
    pub timeframe: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_balance: f64,
    /// Bars at the start of the window used only as indicator history.
    pub warmup_bars: usize,
    /// Ask the advisor every n-th simulated bar.
    pub analysis_interval: usize,
    /// Trailing bars handed to the advisor and the position manager.
    pub analysis_window: usize,
    pub min_confidence: f64,
    /// Used when a recommendation carries no risk percentage of its own.
    pub default_risk_percentage: f64,
    pub manage_positions: bool,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        if self.start_date >= self.end_date {
            return Err(TraderError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Initializing,
    Running,
    Finalizing,
    Done,
}

/// Cloneable flag that aborts a run at the next bar boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Opened {
        side: Side,
        size: u64,
        entry_price: f64,
    },
    Hold,
    BelowConfidence {
        confidence: f64,
    },
    Rejected {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

/// One advisory request and what the engine did with the answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub timestamp: NaiveDateTime,
    pub outcome: AnalysisOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub timeframe: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub bars_processed: usize,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityCurvePoint>,
    pub statistics: Statistics,
    pub analysis_history: Vec<AnalysisRecord>,
}

pub struct BacktestEngine<A> {
    config: BacktestConfig,
    advisor: A,
    cancel: CancelHandle,
    state: RunState,
}

impl<A: AdvisoryPort> BacktestEngine<A> {
    pub fn new(config: BacktestConfig, advisor: A) -> Self {
        BacktestEngine {
            config,
            advisor,
            cancel: CancelHandle::default(),
            state: RunState::Initializing,
        }
    }

    /// Share an existing cancel handle instead of the engine's own.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn advisor(&self) -> &A {
        &self.advisor
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Simulate over `bars` (ascending by timestamp), forwarding every intent
    /// to `execution`.
    ///
    /// Fails before any state is produced on a bad date range or when the
    /// window holds no bars past the warm-up. Returns
    /// [`TraderError::Cancelled`] if the cancel handle fires mid-run.
    pub async fn run(
        &mut self,
        bars: &[Bar],
        execution: &mut dyn ExecutionPort,
    ) -> Result<BacktestResult, TraderError> {
        self.state = RunState::Initializing;
        self.config.validate()?;

        let window: Vec<Bar> = bars
            .iter()
            .filter(|b| {
                let day = b.timestamp.date();
                day >= self.config.start_date && day <= self.config.end_date
            })
            .cloned()
            .collect();

        if window.len() <= self.config.warmup_bars {
            return Err(TraderError::InsufficientData {
                symbol: self.config.symbol.clone(),
                bars: window.len(),
                minimum: self.config.warmup_bars + 1,
            });
        }

        log::info!(
            "backtest {} {}: {} bars from {} to {}, balance {:.2}",
            self.config.symbol,
            self.config.timeframe,
            window.len(),
            self.config.start_date,
            self.config.end_date,
            self.config.initial_balance
        );

        let mut portfolio = Portfolio::new(self.config.initial_balance);
        let mut history = Vec::new();
        let mut ladders = LadderBook::new();
        let mut bars_processed = 0usize;
        let last_index = window.len() - 1;
        let interval = self.config.analysis_interval.max(1);

        self.state = RunState::Running;
        for index in self.config.warmup_bars..window.len() {
            if self.cancel.is_cancelled() {
                log::warn!("backtest cancelled after {bars_processed} bars");
                return Err(TraderError::Cancelled { bars_processed });
            }

            let bar = &window[index];
            let trailing = trailing_window(&window, index, self.config.analysis_window);

            let closed = check_exits(&mut portfolio.open_positions, bar);
            for trade in &closed {
                submit(execution, &close_intent(trade));
            }
            portfolio.record_closed(closed);

            if self.config.manage_positions {
                manage_open_positions(&mut portfolio, &mut ladders, trailing, bar, execution);
            }

            let step = index - self.config.warmup_bars;
            if portfolio.has_capacity() && step % interval == 0 {
                let outcome = self
                    .consider_entry(&mut portfolio, trailing, bar, execution)
                    .await;
                history.push(AnalysisRecord {
                    timestamp: bar.timestamp,
                    outcome,
                });
            }

            if index == last_index {
                self.state = RunState::Finalizing;
                let open = portfolio.open_positions.clone();
                for trade in &open {
                    submit(execution, &close_intent(trade));
                }
                portfolio.close_all(bar.close, bar.timestamp, ExitReason::EndOfBacktest);
            }

            portfolio.record_equity(bar.timestamp);
            bars_processed += 1;
        }

        let statistics = Statistics::compute(
            portfolio.initial_balance,
            &portfolio.closed_trades,
            &portfolio.equity_curve,
        );

        log::info!(
            "backtest finished: {} trades, final balance {:.2}, win rate {:.1}%, max drawdown {:.2}%",
            statistics.total_trades,
            portfolio.balance(),
            statistics.win_rate * 100.0,
            statistics.max_drawdown_percentage
        );

        self.state = RunState::Done;
        Ok(BacktestResult {
            symbol: self.config.symbol.clone(),
            timeframe: self.config.timeframe.clone(),
            start_date: self.config.start_date,
            end_date: self.config.end_date,
            initial_balance: portfolio.initial_balance,
            final_balance: portfolio.balance(),
            bars_processed,
            trades: portfolio.closed_trades,
            equity_curve: portfolio.equity_curve,
            statistics,
            analysis_history: history,
        })
    }

    async fn consider_entry(
        &self,
        portfolio: &mut Portfolio,
        trailing: &[Bar],
        bar: &Bar,
        execution: &mut dyn ExecutionPort,
    ) -> AnalysisOutcome {
        let signals = technical_signals(trailing);
        let request = AnalysisRequest {
            symbol: &self.config.symbol,
            timeframe: &self.config.timeframe,
            balance: portfolio.balance(),
            open_positions: &portfolio.open_positions,
            technical_signals: &signals,
            window: trailing,
        };

        let answer = self
            .advisor
            .analyze(&request)
            .await
            .and_then(|rec| rec.validate().map(|_| rec));
        let recommendation = match answer {
            Ok(rec) => rec,
            Err(e) => {
                log::warn!("advisory failed at {}: {e}", bar.timestamp);
                return AnalysisOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let suggestion = &recommendation.recommendation;
        let Some(side) = suggestion.action.side() else {
            return AnalysisOutcome::Hold;
        };
        if !recommendation.is_actionable(self.config.min_confidence) {
            return AnalysisOutcome::BelowConfidence {
                confidence: recommendation.confidence,
            };
        }

        let (Some(stop_loss), Some(take_profit)) = (suggestion.stop_loss, suggestion.take_profit)
        else {
            return rejected(bar, "recommendation has no stop loss or take profit");
        };

        let params = RiskParameters {
            account_balance: portfolio.balance(),
            risk_percentage: suggestion
                .risk_percentage
                .unwrap_or(self.config.default_risk_percentage),
            entry_price: suggestion.entry_price.unwrap_or(bar.close),
            stop_loss,
            take_profit,
        };

        let validation = validate_new_position(&params, &portfolio.open_positions);
        if !validation.is_valid {
            return rejected(bar, validation.reason.unwrap_or_default());
        }

        let sizing = match calculate_position_size(&params) {
            Ok(sizing) => sizing,
            Err(e) => return rejected(bar, e.to_string()),
        };
        if sizing.size == 0 {
            return rejected(bar, "position size rounds down to zero");
        }

        let trade = match Trade::open(
            &self.config.symbol,
            side,
            params.entry_price,
            params.stop_loss,
            params.take_profit,
            sizing.size,
            params.risk_percentage,
            bar.timestamp,
        ) {
            Ok(trade) => trade,
            Err(e) => return rejected(bar, e.to_string()),
        };

        log::info!(
            "opened {} {} x{} @ {:.4} stop {:.4} target {:.4} (confidence {:.0})",
            side,
            trade.symbol,
            trade.size,
            trade.entry_price,
            trade.stop_loss,
            trade.take_profit,
            recommendation.confidence
        );

        submit(
            execution,
            &TradeIntent::Open {
                symbol: trade.symbol.clone(),
                side,
                size: trade.size,
                entry_price: trade.entry_price,
            },
        );
        let outcome = AnalysisOutcome::Opened {
            side,
            size: trade.size,
            entry_price: trade.entry_price,
        };
        portfolio.add_position(trade);
        outcome
    }
}

fn rejected(bar: &Bar, reason: impl Into<String>) -> AnalysisOutcome {
    let reason = reason.into();
    log::info!("skipping entry at {}: {reason}", bar.timestamp);
    AnalysisOutcome::Rejected { reason }
}

fn close_intent(trade: &Trade) -> TradeIntent {
    TradeIntent::Close {
        symbol: trade.symbol.clone(),
    }
}

/// Up to `size` bars ending at (and including) `index`.
fn trailing_window(bars: &[Bar], index: usize, size: usize) -> &[Bar] {
    let start = (index + 1).saturating_sub(size.max(1));
    &bars[start..=index]
}

/// Last scale-out ladder sent per open position, keyed by entry time (at most
/// one entry happens per bar).
type LadderBook = HashMap<NaiveDateTime, Vec<TakeProfitLevel>>;

/// Apply position manager decisions to the open set, one position at a time.
/// Scale-out intents are only re-sent when a position's ladder changes.
fn manage_open_positions(
    portfolio: &mut Portfolio,
    ladders: &mut LadderBook,
    trailing: &[Bar],
    bar: &Bar,
    execution: &mut dyn ExecutionPort,
) {
    for position in portfolio.open_positions.iter_mut() {
        let decision = position_manager::evaluate(position, trailing);
        let ladder_changed = ladders.get(&position.entry_time) != Some(&decision.take_profits);

        for intent in decision_intents(position, &decision) {
            if matches!(intent, TradeIntent::ScaleOut { .. }) && !ladder_changed {
                continue;
            }
            submit(execution, &intent);
        }

        if let Some(reason) = decision.close {
            position.close(
                bar.close,
                bar.timestamp,
                ExitReason::PositionManager(reason),
            );
            continue;
        }

        if ladder_changed {
            ladders.insert(position.entry_time, decision.take_profits);
        }
        if let Some(adjustment) = decision.stop_adjustment {
            log::debug!(
                "{} stop {:.4} -> {:.4}: {}",
                position.symbol,
                position.stop_loss,
                adjustment.new_stop,
                adjustment.reason
            );
            position.stop_loss = adjustment.new_stop;
        }
    }
    portfolio.sweep_closed();

    let open = &portfolio.open_positions;
    ladders.retain(|entry, _| open.iter().any(|p| p.entry_time == *entry));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::Trend;
    use crate::domain::recommendation::{Recommendation, SignalFlags, TradeSuggestion};
    use crate::ports::execution_port::NullExecution;

    struct HoldAdvisor;

    impl AdvisoryPort for HoldAdvisor {
        async fn analyze(&self, _: &AnalysisRequest<'_>) -> Result<Recommendation, TraderError> {
            Ok(Recommendation {
                trend: Trend::Neutral,
                confidence: 90.0,
                key_levels: Default::default(),
                signals: SignalFlags::default(),
                recommendation: TradeSuggestion::hold("nothing to do"),
                patterns: vec![],
            })
        }
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            symbol: "AAPL".into(),
            timeframe: "1d".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            initial_balance: 100_000.0,
            warmup_bars: 5,
            analysis_interval: 1,
            analysis_window: 50,
            min_confidence: 75.0,
            default_risk_percentage: 1.0,
            manage_positions: false,
        }
    }

    fn flat_bars(n: usize) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| Bar {
                timestamp: start + chrono::Duration::days(i as i64),
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn trailing_window_clamps_at_series_start() {
        let bars = flat_bars(10);
        assert_eq!(trailing_window(&bars, 2, 5).len(), 3);
        assert_eq!(trailing_window(&bars, 9, 5).len(), 5);
        assert_eq!(trailing_window(&bars, 9, 5)[4], bars[9]);
    }

    #[test]
    fn cancel_handle_is_shared() {
        let engine = BacktestEngine::new(config(), HoldAdvisor);
        let handle = engine.cancel_handle();
        handle.cancel();
        assert!(engine.cancel_handle().is_cancelled());
    }

    #[tokio::test]
    async fn inverted_dates_are_fatal() {
        let mut cfg = config();
        cfg.end_date = cfg.start_date;
        let mut engine = BacktestEngine::new(cfg, HoldAdvisor);
        let err = engine
            .run(&flat_bars(20), &mut NullExecution)
            .await
            .unwrap_err();
        assert!(matches!(err, TraderError::InvalidDateRange { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn empty_window_is_insufficient_data() {
        let mut cfg = config();
        cfg.start_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        cfg.end_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut engine = BacktestEngine::new(cfg, HoldAdvisor);
        let err = engine
            .run(&flat_bars(20), &mut NullExecution)
            .await
            .unwrap_err();
        assert!(matches!(err, TraderError::InsufficientData { bars: 0, .. }));
    }

    #[tokio::test]
    async fn hold_run_reaches_done() {
        let mut engine = BacktestEngine::new(config(), HoldAdvisor);
        let result = engine.run(&flat_bars(20), &mut NullExecution).await.unwrap();

        assert_eq!(engine.state(), RunState::Done);
        assert_eq!(result.bars_processed, 15);
        assert_eq!(result.equity_curve.len(), 15);
        assert_eq!(result.analysis_history.len(), 15);
        assert!(
            result
                .analysis_history
                .iter()
                .all(|r| r.outcome == AnalysisOutcome::Hold)
        );
        assert_eq!(result.final_balance, result.initial_balance);
    }

    #[tokio::test]
    async fn analysis_interval_samples_bars() {
        let mut cfg = config();
        cfg.analysis_interval = 4;
        let mut engine = BacktestEngine::new(cfg, HoldAdvisor);
        let result = engine.run(&flat_bars(20), &mut NullExecution).await.unwrap();
        // steps 0, 4, 8, 12 of 15
        assert_eq!(result.analysis_history.len(), 4);
    }

    #[tokio::test]
    async fn cancelled_before_first_bar() {
        let mut engine = BacktestEngine::new(config(), HoldAdvisor);
        engine.cancel_handle().cancel();
        let err = engine
            .run(&flat_bars(20), &mut NullExecution)
            .await
            .unwrap_err();
        assert!(matches!(err, TraderError::Cancelled { bars_processed: 0 }));
    }
}
