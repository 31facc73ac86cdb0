//! Port traits for the collaborators the simulation core consumes.

pub mod advisory_port;
pub mod config_port;
pub mod data_port;
pub mod execution_port;
pub mod result_port;
