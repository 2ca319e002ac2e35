use anyhow::Context;
use bandbot::account::AccountManager;
use bandbot::api::{AccountService, Collaborators, MarketData, OrderGateway, PaperBroker, TinkoffClient};
use bandbot::backtest::{prior_day_window, MarketScenario, Report, SyntheticDataGenerator};
use bandbot::config::AppConfig;
use bandbot::execution::RunSummary;
use bandbot::models::{CandleInterval, Instrument};
use bandbot::{StrategyRegistry, TradeParams};
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bandbot")]
#[command(about = "Price band trading bot for the Tinkoff Invest sandbox", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./bandbot.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured strategy (default)
    Run(RunArgs),

    /// Show known tickers and strategies
    List,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Trade against an in-memory broker fed with synthetic candles
    #[arg(long)]
    paper: bool,

    /// Ticker to trade, overriding the config
    #[arg(short, long)]
    ticker: Option<String>,

    /// Strategy identifier, overriding the config
    #[arg(short, long)]
    strategy: Option<String>,

    /// Place real sandbox orders instead of replaying the prior day
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(config, args).await,
        Commands::List => {
            list(&config);
            Ok(())
        }
    }
}

fn setup_logging(verbose: bool) {
    let default_directive = if verbose { "bandbot=debug" } else { "bandbot=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn list(config: &AppConfig) {
    println!("Strategies:");
    for name in StrategyRegistry::with_defaults().names() {
        println!("  {}", name);
    }
    println!("Instruments: {}", config.instruments.len());
    for (ticker, figi) in config.instruments.iter() {
        println!("  {:<6} {}", ticker, figi);
    }
}

async fn run(mut config: AppConfig, args: RunArgs) -> anyhow::Result<()> {
    if let Some(ticker) = args.ticker {
        config.trade.ticker = ticker;
    }
    if let Some(strategy) = args.strategy {
        config.trade.strategy = strategy;
    }
    if args.live {
        config.trade.simulate = false;
    }

    let figi = config
        .instruments
        .resolve(&config.trade.ticker)
        .context("ticker is not in the instrument table")?
        .to_string();

    tracing::info!(
        ticker = %config.trade.ticker,
        figi = %figi,
        strategy = %config.trade.strategy,
        simulate = config.trade.simulate,
        paper = args.paper,
        "🚀 Bandbot starting"
    );

    let (collaborators, accounts) = if args.paper {
        wire(paper_broker(&config.trade.ticker, &figi, config.trade.interval))
    } else {
        let client = TinkoffClient::new(&config.broker).context("failed to create broker client")?;
        wire(Arc::new(client))
    };

    let strategy = StrategyRegistry::with_defaults().create(&config.trade.strategy, collaborators)?;

    // Account id is resolved by `prepare`, after the limits are checked
    let mut params = TradeParams::from_config(&config.trade, String::new(), figi);
    accounts
        .prepare(&mut params, &config.account)
        .await
        .context("can't prepare account")?;

    let cancel = CancellationToken::new();
    spawn_shutdown_watcher(cancel.clone(), config.run_timeout());

    let mut report = Report::new();
    let result = strategy.run(&cancel, &params, &mut report).await;
    cancel.cancel();

    match &result {
        Ok(summary) => tracing::info!(
            strategy = strategy.name(),
            cycles = summary.cycles_completed,
            reason = ?summary.stop_reason,
            "Strategy finished"
        ),
        Err(e) => tracing::error!(strategy = strategy.name(), error = %e, "Strategy failed"),
    }

    finish(result, &report, params.simulate, &config.report_path)
}

/// Export the simulation report, then hand back the run's own outcome
///
/// A report that cannot be written is logged; it never replaces the run error.
fn finish(
    result: bandbot::Result<RunSummary>,
    report: &Report,
    simulate: bool,
    report_path: &Path,
) -> anyhow::Result<()> {
    if simulate {
        if let Some(summary) = &report.summary {
            summary.print_report();
        }
        match report.save(report_path) {
            Ok(()) => tracing::info!(
                path = %report_path.display(),
                ticks = report.ticks.len(),
                "Report saved"
            ),
            Err(e) => tracing::error!(
                path = %report_path.display(),
                error = %e,
                "Failed to write report"
            ),
        }
    }

    tracing::info!("👋 Bandbot stopped");
    result.map(|_| ()).context("strategy run failed")
}

fn wire<B>(broker: Arc<B>) -> (Collaborators, AccountManager)
where
    B: MarketData + OrderGateway + AccountService + 'static,
{
    let accounts = AccountManager::new(broker.clone(), broker.clone());
    (Collaborators::from_broker(broker), accounts)
}

/// Paper broker with the prior day and the last two hours of synthetic candles
fn paper_broker(ticker: &str, figi: &str, interval: CandleInterval) -> Arc<PaperBroker> {
    let broker = PaperBroker::new();
    broker.add_instrument(Instrument {
        figi: figi.to_string(),
        ticker: ticker.to_string(),
        name: format!("{} (paper)", ticker),
        lot: 10,
        currency: "rub".to_string(),
    });

    let now = Utc::now();
    let step_secs = interval.duration().as_secs().max(1) as i64;
    let mut generator = SyntheticDataGenerator::new(now.timestamp() as u64);

    let (from, to) = prior_day_window(now);
    let day_candles = ((to - from).num_seconds() / step_secs) as usize;
    broker.add_candles(
        figi,
        generator.generate(MarketScenario::Sideways, from, day_candles, interval),
    );

    let recent = (2 * 60 * 60 / step_secs).max(1);
    let recent_start = now - Duration::seconds(recent * step_secs);
    broker.add_candles(
        figi,
        generator.generate(MarketScenario::Sideways, recent_start, recent as usize, interval),
    );

    broker.set_fill_after_polls(1);
    Arc::new(broker)
}

/// Cancel the run on Ctrl+C or once `timeout` elapses
fn spawn_shutdown_watcher(cancel: CancellationToken, timeout: std::time::Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
            }
            _ = tokio::time::sleep(timeout) => {
                tracing::info!(timeout_secs = timeout.as_secs(), "Run timeout reached");
            }
            _ = cancel.cancelled() => {}
        }
        cancel.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandbot::execution::StopReason;
    use bandbot::Error;

    #[test]
    fn test_unwritable_report_keeps_run_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");

        let err = finish(Err(Error::EmptyInput), &Report::new(), true, &path).unwrap_err();

        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmptyInput)));
        assert!(!path.exists());
    }

    #[test]
    fn test_report_written_after_successful_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let summary = RunSummary {
            cycles_completed: 1,
            stop_reason: StopReason::SimulationFinished,
        };

        finish(Ok(summary), &Report::new(), true, &path).unwrap();
        assert_eq!(Report::load(&path).unwrap(), Report::new());
    }
}
