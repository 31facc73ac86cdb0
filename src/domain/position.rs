//! Trade (position) lifecycle: open, trigger checks, close.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    EndOfBacktest,
    PositionManager(String),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::EndOfBacktest => write!(f, "end_of_backtest"),
            ExitReason::PositionManager(why) => write!(f, "position_manager: {why}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    /// Stop at entry. Trailing moves `stop_loss` only.
    pub initial_stop_loss: f64,
    pub take_profit: f64,
    pub size: u64,
    pub risk_percentage: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: Option<NaiveDateTime>,
    pub exit_price: Option<f64>,
    pub pnl: Option<f64>,
    pub pnl_percentage: Option<f64>,
    pub reason: Option<ExitReason>,
}

/// Check the side/entry/stop/target ordering a trade must satisfy.
///
/// Long: stop < entry < target. Short: target < entry < stop.
pub fn validate_levels(
    side: Side,
    entry_price: f64,
    stop_loss: f64,
    take_profit: f64,
) -> Result<(), TraderError> {
    let ordered = match side {
        Side::Long => stop_loss < entry_price && entry_price < take_profit,
        Side::Short => take_profit < entry_price && entry_price < stop_loss,
    };
    if ordered {
        Ok(())
    } else {
        Err(TraderError::InvalidStopLoss {
            entry_price,
            stop_loss,
        })
    }
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: &str,
        side: Side,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
        size: u64,
        risk_percentage: f64,
        entry_time: NaiveDateTime,
    ) -> Result<Self, TraderError> {
        validate_levels(side, entry_price, stop_loss, take_profit)?;
        Ok(Trade {
            symbol: symbol.to_string(),
            side,
            entry_price,
            stop_loss,
            initial_stop_loss: stop_loss,
            take_profit,
            size,
            risk_percentage,
            entry_time,
            exit_time: None,
            exit_price: None,
            pnl: None,
            pnl_percentage: None,
            reason: None,
        })
    }

    /// Distance from entry to the initial stop; one R.
    pub fn initial_risk(&self) -> f64 {
        (self.entry_price - self.initial_stop_loss).abs()
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.size as f64
    }

    /// Long stops trigger on the bar low, short stops on the bar high.
    pub fn should_stop_loss(&self, bar: &Bar) -> bool {
        match self.side {
            Side::Long => bar.low <= self.stop_loss,
            Side::Short => bar.high >= self.stop_loss,
        }
    }

    pub fn should_take_profit(&self, bar: &Bar) -> bool {
        match self.side {
            Side::Long => bar.high >= self.take_profit,
            Side::Short => bar.low <= self.take_profit,
        }
    }

    /// Close the trade. A trade that already has an exit is left untouched.
    pub fn close(&mut self, exit_price: f64, exit_time: NaiveDateTime, reason: ExitReason) {
        if !self.is_open() {
            return;
        }

        let pnl = self.unrealized_pnl(exit_price);
        let notional = self.entry_price * self.size as f64;

        self.exit_time = Some(exit_time);
        self.exit_price = Some(exit_price);
        self.pnl = Some(pnl);
        self.pnl_percentage = Some(if notional > 0.0 {
            pnl / notional * 100.0
        } else {
            0.0
        });
        self.reason = Some(reason);
    }

    pub fn realized_pnl(&self) -> f64 {
        self.pnl.unwrap_or(0.0)
    }
}
