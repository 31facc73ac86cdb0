//! Advisory recommendation contract.
//!
//! The advisory service is opaque; only the shape and numeric bounds of its
//! answer are checked before the engine acts on it.

use serde::{Deserialize, Serialize};

use crate::domain::error::TraderError;
use crate::domain::indicator::{KeyLevels, Trend};
use crate::domain::position::Side;
use crate::domain::risk::{MAX_RISK_PERCENTAGE, MIN_RISK_PERCENTAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn side(self) -> Option<Side> {
        match self {
            Action::Buy => Some(Side::Long),
            Action::Sell => Some(Side::Short),
            Action::Hold => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalFlags {
    pub ema_pullback: bool,
    pub mean_reversion: bool,
    pub breakout: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSuggestion {
    pub action: Action,
    #[serde(default)]
    pub entry_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub risk_percentage: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl TradeSuggestion {
    pub fn hold(reasoning: impl Into<String>) -> Self {
        TradeSuggestion {
            action: Action::Hold,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            risk_percentage: None,
            reasoning: Some(reasoning.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub trend: Trend,
    pub confidence: f64,
    #[serde(default)]
    pub key_levels: KeyLevels,
    #[serde(default)]
    pub signals: SignalFlags,
    pub recommendation: TradeSuggestion,
    #[serde(default)]
    pub patterns: Vec<String>,
}

fn malformed(field: &str, reason: impl Into<String>) -> TraderError {
    TraderError::MalformedRecommendation {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn check_price(field: &str, value: Option<f64>) -> Result<(), TraderError> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => {
            Err(malformed(field, format!("{v} is not a positive price")))
        }
        _ => Ok(()),
    }
}

impl Recommendation {
    /// Structural and numeric bounds. Risk-reward is left to the risk manager.
    pub fn validate(&self) -> Result<(), TraderError> {
        if !self.confidence.is_finite() || !(0.0..=100.0).contains(&self.confidence) {
            return Err(malformed(
                "confidence",
                format!("{} outside [0, 100]", self.confidence),
            ));
        }

        let suggestion = &self.recommendation;
        if let Some(risk) = suggestion.risk_percentage {
            if !(MIN_RISK_PERCENTAGE..=MAX_RISK_PERCENTAGE).contains(&risk) {
                return Err(malformed(
                    "risk_percentage",
                    format!("{risk} outside [{MIN_RISK_PERCENTAGE}, {MAX_RISK_PERCENTAGE}]"),
                ));
            }
        }

        check_price("entry_price", suggestion.entry_price)?;
        check_price("stop_loss", suggestion.stop_loss)?;
        check_price("take_profit", suggestion.take_profit)?;

        if suggestion.action != Action::Hold {
            if suggestion.stop_loss.is_none() {
                return Err(malformed("stop_loss", "required for buy/sell"));
            }
            if suggestion.take_profit.is_none() {
                return Err(malformed("take_profit", "required for buy/sell"));
            }
        }

        Ok(())
    }

    pub fn is_actionable(&self, min_confidence: f64) -> bool {
        self.recommendation.action != Action::Hold && self.confidence >= min_confidence
    }
}
