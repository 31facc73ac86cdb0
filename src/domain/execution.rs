//! Trade intents and simulated fills.
//!
//! The engine and position manager only emit [`TradeIntent`]s; forwarding
//! them to a venue is the job of an [`ExecutionPort`]. Inside a backtest the
//! fills themselves are simulated here against each bar's high/low.

use serde::Serialize;

use crate::domain::ohlcv::Bar;
use crate::domain::position::{ExitReason, Side, Trade};
use crate::domain::position_manager::PositionDecision;
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradeIntent {
    Open {
        symbol: String,
        side: Side,
        size: u64,
        entry_price: f64,
    },
    ModifyStop {
        symbol: String,
        new_stop: f64,
    },
    ModifyTarget {
        symbol: String,
        new_target: f64,
    },
    /// One resting scale-out order at `price` for `size` units.
    ScaleOut {
        symbol: String,
        price: f64,
        size: u64,
    },
    Close {
        symbol: String,
    },
}

/// Forward an intent to the sink. Sink failures are logged, never propagated:
/// the simulation state is authoritative.
pub fn submit(port: &mut dyn ExecutionPort, intent: &TradeIntent) {
    let result = match intent {
        TradeIntent::Open {
            symbol,
            side,
            size,
            entry_price,
        } => port.open(symbol, *side, *size, *entry_price),
        TradeIntent::ModifyStop { symbol, new_stop } => port.modify_stop(symbol, *new_stop),
        TradeIntent::ModifyTarget { symbol, new_target } => {
            port.modify_target(symbol, *new_target)
        }
        TradeIntent::ScaleOut {
            symbol,
            price,
            size,
        } => port.scale_out(symbol, *price, *size),
        TradeIntent::Close { symbol } => port.close(symbol),
    };

    if let Err(e) = result {
        log::warn!("execution sink rejected {intent:?}: {e}");
    }
}

/// Intents implied by a position manager decision. A close supersedes
/// everything else; otherwise any stop adjustment comes first, followed by
/// one scale-out per non-empty ladder level.
pub fn decision_intents(position: &Trade, decision: &PositionDecision) -> Vec<TradeIntent> {
    if decision.close.is_some() {
        return vec![TradeIntent::Close {
            symbol: position.symbol.clone(),
        }];
    }

    let stop = decision
        .stop_adjustment
        .iter()
        .map(|adj| TradeIntent::ModifyStop {
            symbol: position.symbol.clone(),
            new_stop: adj.new_stop,
        });
    let ladder = decision
        .take_profits
        .iter()
        .filter(|level| level.size > 0)
        .map(|level| TradeIntent::ScaleOut {
            symbol: position.symbol.clone(),
            price: level.price,
            size: level.size,
        });
    stop.chain(ladder).collect()
}

/// Exit a position against one bar. Stop-loss is checked before take-profit,
/// so a bar that spans both closes at the stop.
pub fn check_exit(position: &mut Trade, bar: &Bar) -> bool {
    if position.should_stop_loss(bar) {
        position.close(position.stop_loss, bar.timestamp, ExitReason::StopLoss);
        true
    } else if position.should_take_profit(bar) {
        position.close(position.take_profit, bar.timestamp, ExitReason::TakeProfit);
        true
    } else {
        false
    }
}

/// Run exit checks over every open position and move the closed ones out.
///
/// Two passes: trigger every position first, then split the set, so that
/// evaluation order never depends on removals.
pub fn check_exits(open_positions: &mut Vec<Trade>, bar: &Bar) -> Vec<Trade> {
    for position in open_positions.iter_mut() {
        check_exit(position, bar);
    }

    let (closed, still_open): (Vec<Trade>, Vec<Trade>) =
        open_positions.drain(..).partition(|t| !t.is_open());
    *open_positions = still_open;
    closed
}
