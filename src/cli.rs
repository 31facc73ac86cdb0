//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_result_adapter::JsonResultAdapter;
use crate::adapters::paper_execution::PaperExecutionAdapter;
use crate::adapters::retrying_advisor::{RetryingAdvisor, RetrySettings};
use crate::adapters::technical_advisor::TechnicalAdvisor;
use crate::domain::backtest::{BacktestConfig, BacktestEngine, BacktestResult};
use crate::domain::config_validation::{
    parse_date, validate_advisory_config, validate_backtest_config,
};
use crate::domain::error::TraderError;
use crate::domain::execution::TradeIntent;
use crate::domain::ohlcv::Bar;
use crate::domain::risk::{RiskParameters, calculate_position_size, validate_new_position};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::result_port::ResultSink;

#[derive(Parser, Debug)]
#[command(name = "vtrader", about = "Advisory-driven trading backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <SYMBOL>_<TIMEFRAME>.csv files
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Write the result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Size a single trade with the risk manager
    Size {
        #[arg(long)]
        balance: f64,
        /// Percent of balance to risk (0.5-2.0)
        #[arg(long)]
        risk: f64,
        #[arg(long)]
        entry: f64,
        #[arg(long)]
        stop: f64,
        #[arg(long)]
        target: f64,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, data_dir.as_deref(), output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Size {
            balance,
            risk,
            entry,
            stop,
            target,
        } => run_size(&RiskParameters {
            account_balance: balance,
            risk_percentage: risk,
            entry_price: entry,
            stop_loss: stop,
            take_profit: target,
        }),
    }
}

fn fail(err: &TraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TraderError> {
    validate_backtest_config(adapter)?;

    let count = |key: &str, default: i64| -> usize {
        usize::try_from(adapter.get_int("backtest", key, default)).unwrap_or(default as usize)
    };

    Ok(BacktestConfig {
        symbol: adapter
            .get_string("backtest", "symbol")
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        timeframe: adapter
            .get_string("backtest", "timeframe")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "1d".to_string()),
        start_date: parse_date(adapter, "start_date")?,
        end_date: parse_date(adapter, "end_date")?,
        initial_balance: adapter.get_double("backtest", "initial_capital", 100_000.0),
        warmup_bars: count("warmup_bars", 50),
        analysis_interval: count("analysis_interval", 1),
        analysis_window: count("analysis_window", 100),
        min_confidence: adapter.get_double("backtest", "min_confidence", 75.0),
        default_risk_percentage: adapter.get_double("backtest", "default_risk_percentage", 1.0),
        manage_positions: adapter.get_bool("backtest", "manage_positions", false),
    })
}

/// `--data-dir` wins over `[data] dir`, which wins over the working directory.
pub fn resolve_data_dir(adapter: &dyn ConfigPort, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| adapter.get_string("data", "dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Run one simulation with the rule-based advisor behind the retry layer,
/// recording intents on a paper venue.
pub async fn run_backtest_pipeline(
    config: BacktestConfig,
    settings: RetrySettings,
    bars: &[Bar],
) -> Result<(BacktestResult, Vec<TradeIntent>), TraderError> {
    let advisor = RetryingAdvisor::new(
        TechnicalAdvisor::new(config.default_risk_percentage),
        settings,
    );
    let mut engine = BacktestEngine::new(config, advisor);
    let mut paper = PaperExecutionAdapter::new();

    let cancel = engine.cancel_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, cancelling at next bar");
            cancel.cancel();
        }
    });

    let result = engine.run(bars, &mut paper).await;
    watcher.abort();
    Ok((result?, paper.into_intents()))
}

fn run_backtest(config_path: &Path, data_dir: Option<&Path>, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if let Err(e) = validate_advisory_config(&adapter) {
        return fail(&e);
    }
    let settings = RetrySettings::from_config(&adapter);

    let data = CsvAdapter::new(resolve_data_dir(&adapter, data_dir));
    let bars = match data.get_bars(
        &config.symbol,
        &config.timeframe,
        None,
        Some(config.start_date),
        Some(config.end_date),
    ) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };
    eprintln!("  Loaded {} bars for {}", bars.len(), config.symbol);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => return fail(&TraderError::Io(e)),
    };
    let (result, intents) =
        match runtime.block_on(run_backtest_pipeline(config, settings, &bars)) {
            Ok(r) => r,
            Err(e) => return fail(&e),
        };

    print_summary(&result, intents.len());

    if let Some(path) = output {
        if let Err(e) = JsonResultAdapter::new(path.to_path_buf()).store(&result) {
            return fail(&e);
        }
        eprintln!("\nResult written to: {}", path.display());
    }

    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult, intents: usize) {
    let stats = &result.statistics;
    eprintln!("\n=== Results: {} {} ===", result.symbol, result.timeframe);
    eprintln!("Initial Balance:  {:.2}", result.initial_balance);
    eprintln!("Final Balance:    {:.2}", result.final_balance);
    eprintln!("Total Return:     {:.2}%", stats.total_return * 100.0);
    eprintln!("Total Trades:     {}", stats.total_trades);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    if stats.profit_factor.is_infinite() {
        eprintln!("Profit Factor:    inf");
    } else {
        eprintln!("Profit Factor:    {:.2}", stats.profit_factor);
    }
    eprintln!(
        "Max Drawdown:     {:.2} ({:.2}%)",
        stats.max_drawdown, stats.max_drawdown_percentage
    );
    eprintln!("Sharpe (per bar): {:.3}", stats.sharpe_ratio);
    eprintln!("Bars Simulated:   {}", result.bars_processed);
    eprintln!("Advisory Calls:   {}", result.analysis_history.len());
    eprintln!("Order Intents:    {intents}");
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if let Err(e) = validate_advisory_config(&adapter) {
        return fail(&e);
    }
    let settings = RetrySettings::from_config(&adapter);

    eprintln!("\nBacktest:");
    eprintln!("  symbol:     {} ({})", config.symbol, config.timeframe);
    eprintln!("  window:     {} .. {}", config.start_date, config.end_date);
    eprintln!("  balance:    {:.2}", config.initial_balance);
    eprintln!(
        "  analysis:   every {} bar(s), {} bar window, warm-up {}",
        config.analysis_interval, config.analysis_window, config.warmup_bars
    );
    eprintln!("  confidence: >= {}", config.min_confidence);
    eprintln!("\nAdvisory:");
    eprintln!(
        "  retries {} / backoff {}ms / timeout {}ms / min interval {}ms",
        settings.max_retries,
        settings.initial_backoff.as_millis(),
        settings.timeout.as_millis(),
        settings.min_interval.as_millis()
    );
    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) =
        validate_backtest_config(&adapter).and_then(|_| validate_advisory_config(&adapter))
    {
        return fail(&e);
    }
    eprintln!("Configuration is valid");
    ExitCode::SUCCESS
}

fn run_size(params: &RiskParameters) -> ExitCode {
    let sizing = match calculate_position_size(params) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    println!("size:              {}", sizing.size);
    println!("risk_amount:       {:.2}", sizing.risk_amount);
    println!("max_risk_amount:   {:.2}", sizing.max_risk_amount);
    println!("risk_reward_ratio: {:.2}", sizing.risk_reward_ratio);

    let validation = validate_new_position(params, &[]);
    match validation.reason {
        None => println!("valid:             yes"),
        Some(reason) => println!("valid:             no ({reason})"),
    }
    ExitCode::SUCCESS
}
