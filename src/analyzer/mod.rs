// Price band analysis
pub mod window;

pub use window::SlidingWindow;

use crate::error::Error;
use crate::models::{Candle, PriceBand};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Number of recent completed candles averaged on each side
pub const DEFAULT_WINDOW: usize = 3;
/// Fraction of the high/low spread pulled in from each edge
pub const DEFAULT_MARGIN_RATIO: f64 = 0.01;

// Absorbs float noise when prices already sit on the cent grid
const CENT_EPSILON: f64 = 1e-6;

/// Turns recent candles into a buy/sell price band
///
/// Averages the lows and highs of the last `window` completed candles, then
/// narrows the band by `margin_ratio` of the spread on both sides. The buy
/// price rounds up and the sell price rounds down to the cent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BandAnalyzer {
    pub window: usize,
    pub margin_ratio: f64,
}

impl Default for BandAnalyzer {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            margin_ratio: DEFAULT_MARGIN_RATIO,
        }
    }
}

impl BandAnalyzer {
    pub fn new(window: usize, margin_ratio: f64) -> Self {
        Self {
            window,
            margin_ratio,
        }
    }

    /// Compute the band from candles ordered oldest to newest
    ///
    /// Incomplete candles are ignored. Fails with `EmptyInput` when no
    /// completed candle is available.
    pub fn compute_band(&self, candles: &[Candle]) -> Result<PriceBand> {
        let mut highs = SlidingWindow::new(self.window);
        let mut lows = SlidingWindow::new(self.window);

        for candle in candles.iter().filter(|c| c.is_complete) {
            highs.push(candle.high);
            lows.push(candle.low);
        }

        match (lows.mean(), highs.mean()) {
            (Some(min_avg), Some(max_avg)) => {
                let band = band_from_averages(min_avg, max_avg, self.margin_ratio);
                tracing::debug!(
                    min_avg,
                    max_avg,
                    buy = band.buy_price,
                    sell = band.sell_price,
                    "Computed price band"
                );
                Ok(band)
            }
            _ => Err(Error::EmptyInput),
        }
    }
}

/// Band from averaged lows and highs
///
/// The margin is the spread scaled by `margin_ratio` and rounded to the cent.
/// A band that would cross after rounding collapses onto its midpoint.
pub fn band_from_averages(min_avg: f64, max_avg: f64, margin_ratio: f64) -> PriceBand {
    let delta = max_avg - min_avg;
    let margin = (delta * margin_ratio * 100.0).round() / 100.0;

    let buy_price = ceil_cents(min_avg + margin);
    let sell_price = floor_cents(max_avg - margin);

    if delta >= 0.0 && buy_price > sell_price {
        let mid = round_cents((min_avg + max_avg) / 2.0);
        return PriceBand {
            buy_price: mid,
            sell_price: mid,
        };
    }

    PriceBand {
        buy_price,
        sell_price,
    }
}

pub fn ceil_cents(value: f64) -> f64 {
    (value * 100.0 - CENT_EPSILON).ceil() / 100.0
}

pub fn floor_cents(value: f64) -> f64 {
    (value * 100.0 + CENT_EPSILON).floor() / 100.0
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn make_candles(bars: &[(f64, f64, bool)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        bars.iter()
            .enumerate()
            .map(|(i, &(low, high, is_complete))| Candle {
                time: start + Duration::minutes(i as i64 * 5),
                open: low,
                high,
                low,
                close: high,
                volume: 1000,
                is_complete,
            })
            .collect()
    }

    fn has_cent_precision(value: f64) -> bool {
        ((value * 100.0) - (value * 100.0).round()).abs() < 1e-6
    }

    #[test]
    fn test_band_uses_last_three_completed() {
        let candles = make_candles(&[
            (90.0, 95.0, true), // Falls out of the window
            (100.0, 102.0, true),
            (101.0, 103.0, true),
            (102.0, 104.0, true),
        ]);

        let band = BandAnalyzer::default().compute_band(&candles).unwrap();

        // lows avg 101, highs avg 103, delta 2 -> margin 0.02
        assert_eq!(band.buy_price, 101.02);
        assert_eq!(band.sell_price, 102.98);
    }

    #[test]
    fn test_incomplete_candles_are_ignored() {
        let complete = make_candles(&[
            (100.0, 102.0, true),
            (101.0, 103.0, true),
            (102.0, 104.0, true),
        ]);
        let mut with_partial = complete.clone();
        with_partial.extend(make_candles(&[(10.0, 500.0, false)]));

        let analyzer = BandAnalyzer::default();
        assert_eq!(
            analyzer.compute_band(&complete).unwrap(),
            analyzer.compute_band(&with_partial).unwrap()
        );
    }

    #[test]
    fn test_empty_input() {
        let analyzer = BandAnalyzer::default();

        assert!(matches!(analyzer.compute_band(&[]), Err(Error::EmptyInput)));

        let only_partial = make_candles(&[(100.0, 101.0, false), (100.0, 101.0, false)]);
        assert!(matches!(
            analyzer.compute_band(&only_partial),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_fewer_candles_than_window() {
        let candles = make_candles(&[(200.0, 210.0, true)]);
        let band = BandAnalyzer::default().compute_band(&candles).unwrap();

        // delta 10 -> margin 0.1
        assert_eq!(band.buy_price, 200.1);
        assert_eq!(band.sell_price, 209.9);
    }

    #[test]
    fn test_margin_rounds_to_cent() {
        // delta 1.26 * 0.01 = 0.0126 -> 0.01
        let band = band_from_averages(100.0, 101.26, 0.01);
        assert_eq!(band.buy_price, 100.01);
        assert_eq!(band.sell_price, 101.25);
    }

    #[test]
    fn test_rounding_is_conservative() {
        let band = band_from_averages(100.001, 100.999, 0.0);
        assert_eq!(band.buy_price, 100.01);
        assert_eq!(band.sell_price, 100.99);
    }

    #[test]
    fn test_narrow_band_collapses_to_midpoint() {
        let band = band_from_averages(100.003, 100.004, 0.01);
        assert_eq!(band.buy_price, band.sell_price);
        assert_eq!(band.buy_price, 100.0);
    }

    #[test]
    fn test_custom_window() {
        let candles = make_candles(&[
            (100.0, 110.0, true),
            (104.0, 114.0, true),
        ]);
        let band = BandAnalyzer::new(1, 0.0).compute_band(&candles).unwrap();
        assert_eq!(band.buy_price, 104.0);
        assert_eq!(band.sell_price, 114.0);
    }

    proptest! {
        #[test]
        fn test_buy_never_above_sell(
            bars in prop::collection::vec((1.0f64..5000.0, 0.0f64..100.0, any::<bool>()), 1..40),
            margin_ratio in 0.0f64..0.4,
        ) {
            let bars: Vec<(f64, f64, bool)> = bars
                .into_iter()
                .map(|(low, spread, complete)| (low, low + spread, complete))
                .collect();
            let candles = make_candles(&bars);
            let analyzer = BandAnalyzer::new(DEFAULT_WINDOW, margin_ratio);

            match analyzer.compute_band(&candles) {
                Ok(band) => {
                    prop_assert!(band.buy_price <= band.sell_price);
                    prop_assert!(has_cent_precision(band.buy_price));
                    prop_assert!(has_cent_precision(band.sell_price));
                }
                Err(e) => {
                    prop_assert!(matches!(e, Error::EmptyInput));
                    prop_assert!(bars.iter().all(|b| !b.2));
                }
            }
        }
    }
}
