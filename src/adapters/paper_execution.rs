//! Paper execution venue that records intents instead of placing orders.

use crate::domain::error::TraderError;
use crate::domain::execution::TradeIntent;
use crate::domain::position::Side;
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PaperExecutionAdapter {
    intents: Vec<TradeIntent>,
}

impl PaperExecutionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intents(&self) -> &[TradeIntent] {
        &self.intents
    }

    pub fn into_intents(self) -> Vec<TradeIntent> {
        self.intents
    }

    fn record(&mut self, intent: TradeIntent) -> Result<(), TraderError> {
        log::debug!("paper: {intent:?}");
        self.intents.push(intent);
        Ok(())
    }
}

impl ExecutionPort for PaperExecutionAdapter {
    fn open(
        &mut self,
        symbol: &str,
        side: Side,
        size: u64,
        entry_price: f64,
    ) -> Result<(), TraderError> {
        self.record(TradeIntent::Open {
            symbol: symbol.to_string(),
            side,
            size,
            entry_price,
        })
    }

    fn modify_stop(&mut self, symbol: &str, new_stop: f64) -> Result<(), TraderError> {
        self.record(TradeIntent::ModifyStop {
            symbol: symbol.to_string(),
            new_stop,
        })
    }

    fn modify_target(&mut self, symbol: &str, new_target: f64) -> Result<(), TraderError> {
        self.record(TradeIntent::ModifyTarget {
            symbol: symbol.to_string(),
            new_target,
        })
    }

    fn scale_out(&mut self, symbol: &str, price: f64, size: u64) -> Result<(), TraderError> {
        self.record(TradeIntent::ScaleOut {
            symbol: symbol.to_string(),
            price,
            size,
        })
    }

    fn close(&mut self, symbol: &str) -> Result<(), TraderError> {
        self.record(TradeIntent::Close {
            symbol: symbol.to_string(),
        })
    }
}
