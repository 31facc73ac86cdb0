//! Run statistics computed at finalization.
//!
//! Everything here is a pure function of the closed trades and the equity
//! curve, so recomputing on the same inputs yields identical numbers.

use serde::{Serialize, Serializer};

use super::portfolio::EquityCurvePoint;
use super::position::Trade;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    /// Fraction of closed trades with positive pnl, 0 when there are none.
    pub win_rate: f64,
    /// `+inf` when there are wins but no losses; written as `"inf"`.
    #[serde(serialize_with = "serialize_ratio")]
    pub profit_factor: f64,
    pub total_wins: f64,
    pub total_losses: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Fractional change from initial to final balance.
    pub total_return: f64,
    pub max_drawdown: f64,
    /// Deepest drawdown relative to its own peak; may come from a different
    /// peak than `max_drawdown`.
    pub max_drawdown_percentage: f64,
    /// Longest run of consecutive curve points below the running peak.
    pub max_drawdown_duration: usize,
    /// Mean/stddev of per-bar balance returns, not annualised.
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Mean number of curve points a trade stayed open.
    pub average_trade_duration: f64,
}

fn serialize_ratio<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_infinite() && value.is_sign_positive() {
        serializer.serialize_str("inf")
    } else {
        serializer.serialize_f64(*value)
    }
}

impl Statistics {
    pub fn compute(
        initial_balance: f64,
        trades: &[Trade],
        equity_curve: &[EquityCurvePoint],
    ) -> Self {
        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut breakeven_trades = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_duration = 0usize;

        for trade in trades {
            let pnl = trade.realized_pnl();
            if pnl > 0.0 {
                winning_trades += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                losing_trades += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                breakeven_trades += 1;
            }
            total_duration += bars_held(trade, equity_curve);
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let average_win = if winning_trades > 0 {
            total_wins / winning_trades as f64
        } else {
            0.0
        };

        let average_loss = if losing_trades > 0 {
            total_losses / losing_trades as f64
        } else {
            0.0
        };

        let average_trade_duration = if total_trades > 0 {
            total_duration as f64 / total_trades as f64
        } else {
            0.0
        };

        let final_balance = initial_balance + trades.iter().map(Trade::realized_pnl).sum::<f64>();
        let total_return = if initial_balance > 0.0 {
            (final_balance - initial_balance) / initial_balance
        } else {
            0.0
        };

        let drawdown = compute_drawdown(initial_balance, equity_curve);
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(initial_balance, equity_curve);

        Statistics {
            total_trades,
            winning_trades,
            losing_trades,
            breakeven_trades,
            win_rate,
            profit_factor,
            total_wins,
            total_losses,
            average_win,
            average_loss,
            largest_win,
            largest_loss,
            total_return,
            max_drawdown: drawdown.amount,
            max_drawdown_percentage: drawdown.percentage,
            max_drawdown_duration: drawdown.duration,
            sharpe_ratio,
            sortino_ratio,
            average_trade_duration,
        }
    }
}

/// Curve points strictly after entry and up to and including exit.
fn bars_held(trade: &Trade, equity_curve: &[EquityCurvePoint]) -> usize {
    let Some(exit) = trade.exit_time else {
        return 0;
    };
    equity_curve
        .iter()
        .filter(|p| p.timestamp > trade.entry_time && p.timestamp <= exit)
        .count()
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Drawdown {
    amount: f64,
    percentage: f64,
    duration: usize,
}

fn compute_drawdown(initial_balance: f64, equity_curve: &[EquityCurvePoint]) -> Drawdown {
    let mut peak = initial_balance;
    let mut worst = Drawdown::default();
    let mut current_duration = 0usize;

    for point in equity_curve {
        if point.balance >= peak {
            peak = point.balance;
            current_duration = 0;
            continue;
        }

        let amount = peak - point.balance;
        worst.amount = worst.amount.max(amount);
        if peak > 0.0 {
            let percentage = (amount / peak * 100.0).clamp(0.0, 100.0);
            worst.percentage = worst.percentage.max(percentage);
        }
        current_duration += 1;
        worst.duration = worst.duration.max(current_duration);
    }

    worst
}

fn compute_risk_adjusted(initial_balance: f64, equity_curve: &[EquityCurvePoint]) -> (f64, f64) {
    if equity_curve.is_empty() {
        return (0.0, 0.0);
    }

    let mut previous = initial_balance;
    let returns: Vec<f64> = equity_curve
        .iter()
        .map(|p| {
            let r = if previous > 0.0 {
                (p.balance - previous) / previous
            } else {
                0.0
            };
            previous = p.balance;
            r
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let sharpe = if stddev > 0.0 { mean / stddev } else { 0.0 };

    let downside_variance = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / n;
    let downside = downside_variance.sqrt();
    let sortino = if downside > 0.0 { mean / downside } else { 0.0 };

    (sharpe, sortino)
}
