use bandbot::backtest::{MarketScenario, SimulationRunner, SimulationSummary, SyntheticDataGenerator};
use bandbot::models::{CandleInterval, Instrument};
use bandbot::TradeParams;
use chrono::{TimeZone, Utc};

const CANDLES_PER_DAY: usize = 288;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("bandbot=warn")
        .init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          BANDBOT SIMULATION SUITE                     ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    // Configuration
    let instrument = Instrument {
        figi: "SYNTH".to_string(),
        ticker: "SYNTH".to_string(),
        name: "Synthetic".to_string(),
        lot: 10,
        currency: "rub".to_string(),
    };
    let params = TradeParams::new("backtest", instrument.figi.clone());
    params.validate()?;

    let runner = SimulationRunner::new(params);
    let day_start = Utc
        .with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid start date"))?;

    let mut all_summaries = Vec::new();

    for scenario in MarketScenario::all() {
        // Generate synthetic data
        let mut generator = SyntheticDataGenerator::new(42);
        let candles = generator.generate(scenario, day_start, CANDLES_PER_DAY, CandleInterval::FiveMinutes);

        println!("\n🔬 Running simulation: {}", scenario);
        println!("   Candles: {}", candles.len());

        match runner.replay(&candles, &instrument) {
            Ok(report) => {
                if let Some(summary) = report.summary {
                    summary.print_report();
                    all_summaries.push((scenario.to_string(), summary));
                }
            }
            Err(e) => {
                eprintln!("❌ Simulation failed for {}: {}", scenario, e);
            }
        }
    }

    // Summary comparison
    print_summary_comparison(&all_summaries);

    Ok(())
}

fn print_summary_comparison(results: &[(String, SimulationSummary)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<12} {:>8} {:>8} {:>8} {:>12} {:>12} {:>12}",
        "Scenario", "Orders", "Bought", "Sold", "Profit", "OnMarket", "LiqP&L"
    );
    println!("{}", "─".repeat(80));

    for (name, summary) in results {
        println!(
            "{:<12} {:>8} {:>8} {:>8} {:>12.2} {:>12.2} {:>12.2}",
            name,
            summary.orders_placed,
            summary.buy_fills,
            summary.sell_fills,
            summary.realized_profit,
            summary.on_market_value,
            summary.liquidation_profit
        );
    }

    println!("\n");

    // Find best/worst by realized plus liquidation result
    let total = |s: &SimulationSummary| s.realized_profit + s.liquidation_profit;

    if let Some((best_name, best)) = results
        .iter()
        .max_by(|a, b| total(&a.1).total_cmp(&total(&b.1)))
    {
        println!("🏆 Best Scenario: {} ({:+.2})", best_name, total(best));
    }

    if let Some((worst_name, worst)) = results
        .iter()
        .min_by(|a, b| total(&a.1).total_cmp(&total(&b.1)))
    {
        println!("⚠️  Worst Scenario: {} ({:+.2})", worst_name, total(worst));
    }

    let total_orders: usize = results.iter().map(|(_, s)| s.orders_placed).sum();
    let total_sold: usize = results.iter().map(|(_, s)| s.sell_fills).sum();

    println!("\n📊 Overall Statistics:");
    println!("   Orders Across All Scenarios: {}", total_orders);
    println!("   Round Trips Completed: {}", total_sold);

    println!("\n═══════════════════════════════════════════════════════\n");
}
