//! Trade execution sink port trait.

use crate::domain::error::TraderError;
use crate::domain::position::Side;

/// Receives order intents. Applying them against a real or paper venue is
/// entirely the implementor's concern.
pub trait ExecutionPort {
    fn open(&mut self, symbol: &str, side: Side, size: u64, entry_price: f64)
    -> Result<(), TraderError>;

    fn modify_stop(&mut self, symbol: &str, new_stop: f64) -> Result<(), TraderError>;

    fn modify_target(&mut self, symbol: &str, new_target: f64) -> Result<(), TraderError>;

    /// Rest an order taking `size` units off at `price`.
    fn scale_out(&mut self, symbol: &str, price: f64, size: u64) -> Result<(), TraderError>;

    fn close(&mut self, symbol: &str) -> Result<(), TraderError>;
}

/// Sink that drops every intent. Used when a run has no venue attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExecution;

impl ExecutionPort for NullExecution {
    fn open(&mut self, _: &str, _: Side, _: u64, _: f64) -> Result<(), TraderError> {
        Ok(())
    }

    fn modify_stop(&mut self, _: &str, _: f64) -> Result<(), TraderError> {
        Ok(())
    }

    fn modify_target(&mut self, _: &str, _: f64) -> Result<(), TraderError> {
        Ok(())
    }

    fn scale_out(&mut self, _: &str, _: f64, _: u64) -> Result<(), TraderError> {
        Ok(())
    }

    fn close(&mut self, _: &str) -> Result<(), TraderError> {
        Ok(())
    }
}
