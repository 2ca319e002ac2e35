use crate::models::PriceBand;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One replayed candle as the chart sees it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickRecord {
    pub time: DateTime<Utc>,
    pub market_high: f64,
    pub market_low: f64,
    pub calculated_buy: Option<f64>,
    pub calculated_sell: Option<f64>,
}

impl TickRecord {
    /// Band recommended at this tick, if the queue was full enough
    pub fn band(&self) -> Option<PriceBand> {
        match (self.calculated_buy, self.calculated_sell) {
            (Some(buy_price), Some(sell_price)) => Some(PriceBand {
                buy_price,
                sell_price,
            }),
            _ => None,
        }
    }
}

/// Aggregated outcome of one simulated day
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SimulationSummary {
    pub quantity_per_order: i64, // Pieces
    pub orders_placed: usize,
    pub buy_fills: usize,
    pub sell_fills: usize,
    pub realized_profit: f64,
    pub on_market_value: f64, // Cost of bought but unsold orders
    pub not_taken_value: f64, // Cost of orders never bought
    pub last_price: f64,
    pub liquidation_value: f64,
    pub liquidation_profit: f64,
}

impl SimulationSummary {
    pub fn print_report(&self) {
        println!("\n📊 Simulation Results");
        println!("─────────────────────────────────────");
        println!("   Qty per Order:        {}", self.quantity_per_order);
        println!("   Orders Placed:        {}", self.orders_placed);
        println!(
            "   Bought / Sold:        {} / {}",
            self.buy_fills, self.sell_fills
        );
        println!("   Realized Profit:      {:.2}", self.realized_profit);
        println!("   Still on Market:      {:.2}", self.on_market_value);
        println!("   Not Taken:            {:.2}", self.not_taken_value);
        println!("   Last Price:           {:.2}", self.last_price);
        println!("   Sale at Last Price:   {:.2}", self.liquidation_value);
        println!("   Profit on That Sale:  {:+.2}", self.liquidation_profit);
    }
}

/// Collected output of a strategy run, handed to the chart renderer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub ticks: Vec<TickRecord>,
    pub summary: Option<SimulationSummary>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty() && self.summary.is_none()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
