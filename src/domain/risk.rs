//! Risk manager: position sizing and portfolio risk gates.
//!
//! Every size decision and every stop-loss modification passes through these
//! functions. They are pure and hold no state between calls.

use serde::Serialize;

use crate::domain::error::TraderError;
use crate::domain::position::{Side, Trade};

pub const MIN_RISK_PERCENTAGE: f64 = 0.5;
pub const MAX_RISK_PERCENTAGE: f64 = 2.0;
pub const MAX_OPEN_POSITIONS: usize = 3;
pub const MAX_TOTAL_RISK_PERCENTAGE: f64 = 6.0;
pub const MIN_RISK_REWARD: f64 = 1.0;
pub const MAX_RISK_REWARD: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParameters {
    pub account_balance: f64,
    pub risk_percentage: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSizing {
    pub size: u64,
    pub risk_amount: f64,
    pub max_risk_amount: f64,
    pub risk_reward_ratio: f64,
}

/// Outcome of a risk gate. `reason` is set only when rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn accept() -> Self {
        Validation {
            is_valid: true,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Validation {
            is_valid: false,
            reason: Some(reason.into()),
        }
    }
}

fn risk_in_range(risk_percentage: f64) -> bool {
    (MIN_RISK_PERCENTAGE..=MAX_RISK_PERCENTAGE).contains(&risk_percentage)
}

/// Reward distance over risk distance. A zero risk distance yields infinity.
pub fn risk_reward_ratio(entry_price: f64, stop_loss: f64, take_profit: f64) -> f64 {
    let risk = (entry_price - stop_loss).abs();
    if risk == 0.0 {
        return f64::INFINITY;
    }
    (take_profit - entry_price).abs() / risk
}

pub fn calculate_position_size(params: &RiskParameters) -> Result<PositionSizing, TraderError> {
    if !risk_in_range(params.risk_percentage) {
        return Err(TraderError::InvalidRiskParameter {
            risk_percentage: params.risk_percentage,
            min: MIN_RISK_PERCENTAGE,
            max: MAX_RISK_PERCENTAGE,
        });
    }
    if params.stop_loss == params.entry_price {
        return Err(TraderError::InvalidStopLoss {
            entry_price: params.entry_price,
            stop_loss: params.stop_loss,
        });
    }

    let risk_per_unit = (params.entry_price - params.stop_loss).abs();
    let risk_amount = params.account_balance * params.risk_percentage / 100.0;
    let max_risk_amount = params.account_balance * MAX_RISK_PERCENTAGE / 100.0;
    let size = (risk_amount / risk_per_unit).floor().max(0.0) as u64;

    Ok(PositionSizing {
        size,
        risk_amount,
        max_risk_amount,
        risk_reward_ratio: risk_reward_ratio(
            params.entry_price,
            params.stop_loss,
            params.take_profit,
        ),
    })
}

pub fn validate_new_position(params: &RiskParameters, open_positions: &[Trade]) -> Validation {
    if open_positions.len() >= MAX_OPEN_POSITIONS {
        return Validation::reject(format!(
            "Maximum number of positions ({MAX_OPEN_POSITIONS}) reached"
        ));
    }

    if !risk_in_range(params.risk_percentage) {
        return Validation::reject(format!(
            "Risk percentage {} outside [{MIN_RISK_PERCENTAGE}, {MAX_RISK_PERCENTAGE}]",
            params.risk_percentage
        ));
    }

    let open_risk: f64 = open_positions.iter().map(|t| t.risk_percentage).sum();
    let total_risk = open_risk + params.risk_percentage;
    if total_risk > MAX_TOTAL_RISK_PERCENTAGE {
        return Validation::reject(format!(
            "Total risk {total_risk:.2}% exceeds maximum of {MAX_TOTAL_RISK_PERCENTAGE}%"
        ));
    }

    if params.stop_loss == params.entry_price {
        return Validation::reject("Stop loss equals entry price");
    }

    let ratio = risk_reward_ratio(params.entry_price, params.stop_loss, params.take_profit);
    if !(MIN_RISK_REWARD..=MAX_RISK_REWARD).contains(&ratio) {
        return Validation::reject(format!(
            "Risk-reward ratio {ratio:.2} outside [{MIN_RISK_REWARD}, {MAX_RISK_REWARD}]"
        ));
    }

    Validation::accept()
}

/// Stops may only move in the direction of profit: up for longs, down for
/// shorts. The new stop must keep a risk-reward of at least 1 against the
/// existing target.
pub fn validate_stop_loss_modification(position: &Trade, new_stop_loss: f64) -> Validation {
    let (improves, beyond_target) = match position.side {
        Side::Long => (
            new_stop_loss > position.stop_loss,
            new_stop_loss >= position.take_profit,
        ),
        Side::Short => (
            new_stop_loss < position.stop_loss,
            new_stop_loss <= position.take_profit,
        ),
    };

    if !improves {
        let direction = match position.side {
            Side::Long => "up",
            Side::Short => "down",
        };
        return Validation::reject(format!(
            "Stop loss can only be moved {direction} for {} positions",
            position.side
        ));
    }

    if beyond_target {
        return Validation::reject("Stop loss cannot cross the take profit");
    }

    let ratio = risk_reward_ratio(position.entry_price, new_stop_loss, position.take_profit);
    if ratio < MIN_RISK_REWARD {
        return Validation::reject(format!(
            "Risk-reward ratio {ratio:.2} below minimum of {MIN_RISK_REWARD}"
        ));
    }

    Validation::accept()
}
