use crate::models::{Candle, CandleInterval};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Sideways/choppy market (±1% around mean)
    Sideways,
    /// High volatility (±2% swings per candle)
    Volatile,
}

impl MarketScenario {
    pub fn all() -> [MarketScenario; 4] {
        [
            MarketScenario::Uptrend,
            MarketScenario::Downtrend,
            MarketScenario::Sideways,
            MarketScenario::Volatile,
        ]
    }
}

impl fmt::Display for MarketScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
        };
        f.write_str(s)
    }
}

/// Generates synthetic candles for simulation and paper trading
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 250.0,
            base_volume: 20_000.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate candles for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `start` - Time of the first candle
    /// * `num_candles` - Number of candles to generate (288 five minute candles make a day)
    /// * `interval` - Spacing between candles
    ///
    /// # Returns
    /// Completed candles, oldest first, prices rounded to the cent
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        start: DateTime<Utc>,
        num_candles: usize,
        interval: CandleInterval,
    ) -> Vec<Candle> {
        let step = Duration::seconds(interval.duration().as_secs() as i64);
        let intervals_per_day = (24 * 60 * 60) as f64 / interval.duration().as_secs().max(1) as f64;

        let mut candles = Vec::with_capacity(num_candles);
        let mut current_price = self.base_price;
        let mean_price = self.base_price;

        for i in 0..num_candles {
            let timestamp = start + step * i as i32;

            match scenario {
                MarketScenario::Uptrend | MarketScenario::Downtrend => {
                    let daily = if scenario == MarketScenario::Uptrend {
                        0.02
                    } else {
                        -0.02
                    };
                    // Reduced noise so the trend stays dominant
                    let drift = current_price * daily / intervals_per_day;
                    let noise = current_price * self.rng.gen_range(-0.001..0.001);
                    current_price += drift + noise;
                }
                MarketScenario::Sideways => {
                    let reversion = (mean_price - current_price) * 0.1; // 10% pull to mean
                    let noise = current_price * self.rng.gen_range(-0.01..0.01);
                    current_price += reversion + noise;
                }
                MarketScenario::Volatile => {
                    current_price += current_price * self.rng.gen_range(-0.02..0.02);
                    current_price = current_price.max(self.base_price * 0.5);
                }
            }

            candles.push(self.create_candle(current_price, timestamp));
        }

        candles
    }

    /// Helper to create a candle from price and timestamp
    fn create_candle(&mut self, price: f64, timestamp: DateTime<Utc>) -> Candle {
        let noise_pct = 0.004; // ±0.4% intrabar movement

        let high = cents(price * (1.0 + self.rng.gen_range(0.0..noise_pct)));
        let low = cents(price * (1.0 - self.rng.gen_range(0.0..noise_pct)));
        let close = cents(price).clamp(low, high);

        // Open stays inside the bar
        let open_raw = price * (1.0 + self.rng.gen_range(-noise_pct..noise_pct));
        let open = cents(open_raw).clamp(low, high);

        // Vary volume ±30%
        let volume = (self.base_volume * self.rng.gen_range(0.7..1.3)) as i64;

        Candle {
            time: timestamp,
            open,
            high,
            low,
            close,
            volume,
            is_complete: true,
        }
    }
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
