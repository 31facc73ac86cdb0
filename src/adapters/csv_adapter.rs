//! CSV file market data adapter.
//!
//! One file per series, named `<SYMBOL>_<TIMEFRAME>.csv`, with a header row
//! `timestamp,open,high,low,close,volume`. Timestamps may be plain dates or
//! date-times.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::MarketDataPort;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::PathBuf;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}_{timeframe}.csv"))
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl MarketDataPort for CsvAdapter {
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: Option<usize>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, TraderError> {
        let path = self.csv_path(symbol, timeframe);
        let unavailable = |reason: String| TraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {e}", path.display())))?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| unavailable(format!("CSV parse error: {e}")))?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
                unavailable(format!(
                    "invalid timestamp {:?} on row {}",
                    row.timestamp,
                    line + 1
                ))
            })?;

            let day = timestamp.date();
            if start.is_some_and(|s| day < s) || end.is_some_and(|e| day > e) {
                continue;
            }

            bars.push(Bar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        if bars.is_empty() {
            return Err(unavailable(format!(
                "no bars in window {} .. {}",
                start.map_or_else(|| "-".to_string(), |d| d.to_string()),
                end.map_or_else(|| "-".to_string(), |d| d.to_string())
            )));
        }

        bars.sort_by_key(|b| b.timestamp);
        if let Some(limit) = limit {
            let excess = bars.len().saturating_sub(limit);
            bars.drain(..excess);
        }

        log::debug!("loaded {} bars from {}", bars.len(), path.display());
        Ok(bars)
    }
}
