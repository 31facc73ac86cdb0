//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_result_adapter;
pub mod paper_execution;
pub mod retrying_advisor;
pub mod technical_advisor;
