//! JSON file result sink.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TraderError;
use crate::ports::result_port::ResultSink;

pub struct JsonResultAdapter {
    path: PathBuf,
}

impl JsonResultAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ResultSink for JsonResultAdapter {
    fn store(&self, result: &BacktestResult) -> Result<(), TraderError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, result)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        log::info!("result written to {}", self.path.display());
        Ok(())
    }
}
