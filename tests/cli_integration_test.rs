//! CLI integration tests: config assembly, data resolution and the
//! subcommands driven through `cli::run` against files on disk.

mod common;

use clap::Parser;
use common::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vtrader::adapters::csv_adapter::CsvAdapter;
use vtrader::adapters::file_config_adapter::FileConfigAdapter;
use vtrader::adapters::retrying_advisor::RetrySettings;
use vtrader::cli::{self, Cli};
use vtrader::domain::error::TraderError;
use vtrader::ports::data_port::MarketDataPort;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[backtest]
symbol = AAPL
timeframe = 1d
initial_capital = 50000
start_date = 2024-01-01
end_date = 2024-12-31
warmup_bars = 30
analysis_interval = 2
analysis_window = 60
min_confidence = 70
default_risk_percentage = 1.5
manage_positions = yes

[advisory]
max_retries = 1
initial_backoff_ms = 10
timeout_ms = 1000
"#;

const MINIMAL_INI: &str = r#"
[backtest]
symbol = MSFT
initial_capital = 100000
start_date = 2024-01-01
end_date = 2024-06-30
"#;

/// Noisy uptrend with a pullback every 15 bars, one row per day from 2024-01-01.
fn write_series(dir: &Path, symbol: &str, timeframe: &str, count: usize) -> PathBuf {
    let path = dir.join(format!("{symbol}_{timeframe}.csv"));
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for i in 0..count {
        let phase = (i % 15) as f64;
        let drift = i as f64 * 0.3;
        let wobble = if phase < 10.0 { phase } else { 20.0 - 2.0 * phase };
        let close = 100.0 + drift + wobble;
        let volume = 1000.0 + (i % 7) as f64 * 150.0;
        out.push_str(&format!(
            "{},{:.2},{:.2},{:.2},{:.2},{volume}\n",
            ts(i).format("%Y-%m-%d"),
            close - 0.4,
            close + 1.2,
            close - 1.2,
            close
        ));
    }
    std::fs::write(&path, out).unwrap();
    path
}

mod config_assembly {
    use super::*;

    #[test]
    fn build_backtest_config_reads_every_key() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert_eq!(config.symbol, "AAPL");
        assert_eq!(config.timeframe, "1d");
        assert_eq!(config.initial_balance, 50_000.0);
        assert_eq!(config.start_date, date(2024, 1, 1));
        assert_eq!(config.end_date, date(2024, 12, 31));
        assert_eq!(config.warmup_bars, 30);
        assert_eq!(config.analysis_interval, 2);
        assert_eq!(config.analysis_window, 60);
        assert_eq!(config.min_confidence, 70.0);
        assert_eq!(config.default_risk_percentage, 1.5);
        assert!(config.manage_positions);
    }

    #[test]
    fn build_backtest_config_defaults() {
        let adapter = FileConfigAdapter::from_string(MINIMAL_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert_eq!(config.timeframe, "1d");
        assert_eq!(config.warmup_bars, 50);
        assert_eq!(config.analysis_interval, 1);
        assert_eq!(config.analysis_window, 100);
        assert_eq!(config.min_confidence, 75.0);
        assert_eq!(config.default_risk_percentage, 1.0);
        assert!(!config.manage_positions);
    }

    #[test]
    fn missing_symbol_is_config_missing() {
        let ini = MINIMAL_INI.replace("symbol = MSFT\n", "");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { ref key, .. } if key == "symbol"));
    }

    #[test]
    fn malformed_date_is_config_invalid() {
        let ini = MINIMAL_INI.replace("2024-06-30", "30/06/2024");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { ref key, .. } if key == "end_date"));
    }

    #[test]
    fn retry_settings_from_advisory_section() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let settings = RetrySettings::from_config(&adapter);
        assert_eq!(settings.max_retries, 1);
        assert_eq!(settings.initial_backoff.as_millis(), 10);
        assert_eq!(settings.timeout.as_millis(), 1000);
        assert_eq!(settings.min_interval.as_millis(), 0);
    }

    #[test]
    fn data_dir_flag_wins_over_config() {
        let ini = format!("{MINIMAL_INI}\n[data]\ndir = /srv/bars\n");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();

        assert_eq!(
            cli::resolve_data_dir(&adapter, Some(Path::new("/tmp/flag"))),
            PathBuf::from("/tmp/flag")
        );
        assert_eq!(
            cli::resolve_data_dir(&adapter, None),
            PathBuf::from("/srv/bars")
        );

        let bare = FileConfigAdapter::from_string(MINIMAL_INI).unwrap();
        assert_eq!(cli::resolve_data_dir(&bare, None), PathBuf::from("."));
    }
}

mod pipeline {
    use super::*;

    #[tokio::test]
    async fn pipeline_runs_technical_advisor_over_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_series(dir.path(), "AAPL", "1d", 200);

        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        let bars = CsvAdapter::new(dir.path().to_path_buf())
            .get_bars(
                "AAPL",
                "1d",
                None,
                Some(config.start_date),
                Some(config.end_date),
            )
            .unwrap();
        assert_eq!(bars.len(), 200);

        let (result, intents) = cli::run_backtest_pipeline(
            config,
            RetrySettings::from_config(&adapter),
            &bars,
        )
        .await
        .unwrap();

        assert_eq!(result.bars_processed, 170);
        assert_eq!(result.equity_curve.len(), 170);
        assert_eq!(result.initial_balance, 50_000.0);
        assert!(result.trades.iter().all(|t| !t.is_open()));
        // Every position produces one open and one close intent at minimum.
        assert!(intents.len() >= 2 * result.trades.len());
        let realized: f64 = result.trades.iter().filter_map(|t| t.pnl).sum();
        assert!((result.final_balance - (50_000.0 + realized)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn pipeline_rejects_short_history() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        let err = cli::run_backtest_pipeline(config, RetrySettings::default(), &flat_bars(10, 50.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TraderError::InsufficientData {
                bars: 10,
                minimum: 31,
                ..
            }
        ));
    }

    #[test]
    fn missing_csv_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvAdapter::new(dir.path().to_path_buf())
            .get_bars("NOPE", "1d", None, None, None)
            .unwrap_err();
        assert!(matches!(err, TraderError::DataUnavailable { .. }));
    }
}

mod subcommands {
    use super::*;

    fn run(args: &[&str]) -> ExitCode {
        cli::run(Cli::parse_from(
            std::iter::once("vtrader").chain(args.iter().copied()),
        ))
    }

    #[test]
    fn validate_accepts_good_file() {
        let file = write_temp_ini(VALID_INI);
        let code = run(&["validate", "--config", file.path().to_str().unwrap()]);
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn validate_rejects_bad_advisory_section() {
        let file = write_temp_ini(&VALID_INI.replace("timeout_ms = 1000", "timeout_ms = 0"));
        let code = run(&["validate", "--config", file.path().to_str().unwrap()]);
        assert_eq!(code, ExitCode::from(2u8));
    }

    #[test]
    fn validate_missing_file_is_config_error() {
        let code = run(&["validate", "--config", "/nonexistent/vtrader.ini"]);
        assert_ne!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn size_prints_and_succeeds() {
        let code = run(&[
            "size",
            "--balance",
            "100000",
            "--risk",
            "1",
            "--entry",
            "150",
            "--stop",
            "145",
            "--target",
            "160",
        ]);
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn size_rejects_out_of_range_risk() {
        let code = run(&[
            "size",
            "--balance",
            "100000",
            "--risk",
            "5",
            "--entry",
            "150",
            "--stop",
            "145",
            "--target",
            "160",
        ]);
        assert_eq!(code, ExitCode::from(3u8));
    }

    #[test]
    fn dry_run_validates_without_data() {
        let file = write_temp_ini(VALID_INI);
        let code = run(&[
            "backtest",
            "--config",
            file.path().to_str().unwrap(),
            "--dry-run",
        ]);
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn backtest_without_data_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_temp_ini(VALID_INI);
        let code = run(&[
            "backtest",
            "--config",
            file.path().to_str().unwrap(),
            "--data-dir",
            dir.path().to_str().unwrap(),
        ]);
        assert_eq!(code, ExitCode::from(5u8));
    }

    #[test]
    fn backtest_writes_json_result() {
        let dir = tempfile::tempdir().unwrap();
        write_series(dir.path(), "AAPL", "1d", 120);
        let ini = format!("{VALID_INI}\n[data]\ndir = {}\n", dir.path().display());
        let file = write_temp_ini(&ini);
        let output = dir.path().join("out").join("result.json");

        let code = run(&[
            "backtest",
            "--config",
            file.path().to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ]);
        assert_eq!(code, ExitCode::SUCCESS);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["bars_processed"], 90);
        assert_eq!(
            json["equity_curve"].as_array().unwrap().len(),
            90
        );
        assert!(json["statistics"]["max_drawdown_percentage"].as_f64().unwrap() <= 100.0);
    }
}
