//! vtrader: advisory-driven trading backtester.
//!
//! Hexagonal architecture: simulation, risk and indicator logic in
//! [`domain`], collaborator traits in [`ports`], concrete implementations in
//! [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
