//! Per-run simulation state: open set, closed trades and equity tracking.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::position::{ExitReason, Trade};
use super::risk::MAX_OPEN_POSITIONS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityCurvePoint {
    pub timestamp: NaiveDateTime,
    pub balance: f64,
}

/// The canonical open-position set for one run. Only the engine mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub initial_balance: f64,
    pub open_positions: Vec<Trade>,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<EquityCurvePoint>,
    realized_pnl: f64,
}

impl Portfolio {
    pub fn new(initial_balance: f64) -> Self {
        Portfolio {
            initial_balance,
            open_positions: Vec::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            realized_pnl: 0.0,
        }
    }

    /// Initial balance plus realized pnl of every closed trade.
    pub fn balance(&self) -> f64 {
        self.initial_balance + self.realized_pnl
    }

    pub fn open_count(&self) -> usize {
        self.open_positions.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.open_positions.len() < MAX_OPEN_POSITIONS
    }

    pub fn add_position(&mut self, trade: Trade) {
        self.open_positions.push(trade);
    }

    /// Move already-closed trades into the ledger.
    pub fn record_closed(&mut self, trades: Vec<Trade>) {
        for trade in trades {
            self.realized_pnl += trade.realized_pnl();
            log::info!(
                "closed {} {} x{} @ {:.4} ({}) pnl {:.2}",
                trade.side,
                trade.symbol,
                trade.size,
                trade.exit_price.unwrap_or(trade.entry_price),
                trade
                    .reason
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                trade.realized_pnl()
            );
            self.closed_trades.push(trade);
        }
    }

    /// Move positions that were closed in place out of the open set.
    pub fn sweep_closed(&mut self) -> usize {
        let (closed, still_open): (Vec<Trade>, Vec<Trade>) =
            self.open_positions.drain(..).partition(|t| !t.is_open());
        self.open_positions = still_open;
        let count = closed.len();
        self.record_closed(closed);
        count
    }

    /// Close and remove every open position matching `predicate`.
    pub fn close_where(
        &mut self,
        price: f64,
        timestamp: NaiveDateTime,
        reason: &ExitReason,
        predicate: impl Fn(&Trade) -> bool,
    ) -> usize {
        let (mut closing, keep): (Vec<Trade>, Vec<Trade>) =
            self.open_positions.drain(..).partition(|t| predicate(t));
        self.open_positions = keep;
        for trade in closing.iter_mut() {
            trade.close(price, timestamp, reason.clone());
        }
        let count = closing.len();
        self.record_closed(closing);
        count
    }

    /// Force-close everything still open.
    pub fn close_all(&mut self, price: f64, timestamp: NaiveDateTime, reason: ExitReason) -> usize {
        self.close_where(price, timestamp, &reason, |_| true)
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime) {
        let balance = self.balance();
        self.equity_curve.push(EquityCurvePoint { timestamp, balance });
    }
}
