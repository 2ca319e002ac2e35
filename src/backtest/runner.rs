use crate::api::MarketData;
use crate::backtest::report::{Report, SimulationSummary, TickRecord};
use crate::config::TradeParams;
use crate::error::Error;
use crate::models::{Candle, Instrument, PriceBand};
use crate::Result;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use std::collections::VecDeque;

/// Virtual order tracked during a replay
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedOrder {
    pub buy_price: f64,
    pub sell_price: f64,
    pub quantity: i64, // Pieces
    pub profit: f64,
    pub is_purchased: bool,
    pub is_sold: bool,
}

impl SimulatedOrder {
    fn new(band: PriceBand, quantity: i64) -> Self {
        Self {
            buy_price: band.buy_price,
            sell_price: band.sell_price,
            quantity,
            profit: band.spread() * quantity as f64,
            is_purchased: false,
            is_sold: false,
        }
    }

    fn buy_sum(&self) -> f64 {
        self.buy_price * self.quantity as f64
    }
}

/// Replays one day of candles against the band analyzer
///
/// No orders reach the gateway. Every band the analyzer recommends becomes a
/// virtual order unless its profit is under `min_profit`; later candles fill
/// the buy side, then the sell side, when their range touches the price.
pub struct SimulationRunner {
    params: TradeParams,
}

impl SimulationRunner {
    pub fn new(params: TradeParams) -> Self {
        Self { params }
    }

    /// Fetch the prior calendar day and replay it
    ///
    /// # Arguments
    /// * `market` - Candle source
    /// * `instrument` - Instrument being simulated; its lot sizes the orders
    /// * `now` - Reference time; the replayed day is the one before it (UTC)
    pub async fn simulate(
        &self,
        market: &dyn MarketData,
        instrument: &Instrument,
        now: DateTime<Utc>,
    ) -> Result<Report> {
        let (from, to) = prior_day_window(now);
        tracing::info!(
            figi = %instrument.figi,
            %from,
            %to,
            interval = %self.params.interval,
            "Fetching simulation candles"
        );

        let candles = market
            .get_candles(&instrument.figi, from, to, self.params.interval)
            .await?;

        self.replay(&candles, instrument)
    }

    /// Replay candles ordered oldest to newest
    pub fn replay(&self, candles: &[Candle], instrument: &Instrument) -> Result<Report> {
        let queue_len = self.params.queue_len();
        let quantity = instrument
            .lot
            .checked_mul(self.params.simulated_lot_multiplier)
            .ok_or_else(|| {
                Error::Config(format!(
                    "order size overflows: lot {} x multiplier {}",
                    instrument.lot, self.params.simulated_lot_multiplier
                ))
            })?;

        let mut report = Report::new();
        let mut orders: Vec<SimulatedOrder> = Vec::new();
        let mut queue: VecDeque<Candle> = VecDeque::with_capacity(queue_len + 1);
        let mut buy_fills = 0;
        let mut sell_fills = 0;
        let mut last_price = 0.0;

        for candle in candles {
            for order in orders.iter_mut() {
                if !order.is_purchased {
                    if candle.contains(order.buy_price) {
                        order.is_purchased = true;
                        buy_fills += 1;
                    }
                    continue;
                }
                if !order.is_sold && candle.contains(order.sell_price) {
                    order.is_sold = true;
                    sell_fills += 1;
                }
            }

            if !candle.is_complete {
                continue;
            }

            let mut tick = TickRecord {
                time: candle.time,
                market_high: candle.high,
                market_low: candle.low,
                calculated_buy: None,
                calculated_sell: None,
            };

            if queue.len() > queue_len {
                let band = self.params.analyzer.compute_band(queue.make_contiguous())?;
                tick.calculated_buy = Some(band.buy_price);
                tick.calculated_sell = Some(band.sell_price);

                let order = SimulatedOrder::new(band, quantity);
                if order.profit < self.params.min_profit {
                    tracing::info!(
                        buy = band.buy_price,
                        sell = band.sell_price,
                        quantity,
                        profit = order.profit,
                        "Period skipped"
                    );
                } else {
                    tracing::info!(
                        buy = band.buy_price,
                        sell = band.sell_price,
                        quantity,
                        profit = order.profit,
                        "Recommended prices"
                    );
                    orders.push(order);
                    queue.pop_front();
                }
            }

            tracing::debug!(
                volume = candle.volume,
                high = candle.high,
                low = candle.low,
                "Added candle"
            );
            queue.push_back(candle.clone());
            report.ticks.push(tick);
            last_price = candle.high;
        }

        let summary = summarize(&orders, quantity, buy_fills, sell_fills, last_price);
        tracing::info!(
            orders = summary.orders_placed,
            buy_fills = summary.buy_fills,
            sell_fills = summary.sell_fills,
            profit = summary.realized_profit,
            on_market = summary.on_market_value,
            not_taken = summary.not_taken_value,
            liquidation = summary.liquidation_value,
            liquidation_profit = summary.liquidation_profit,
            "Simulation complete"
        );

        report.summary = Some(summary);
        Ok(report)
    }
}

fn summarize(
    orders: &[SimulatedOrder],
    quantity: i64,
    buy_fills: usize,
    sell_fills: usize,
    last_price: f64,
) -> SimulationSummary {
    let mut summary = SimulationSummary {
        quantity_per_order: quantity,
        orders_placed: orders.len(),
        buy_fills,
        sell_fills,
        last_price,
        ..Default::default()
    };
    let mut on_market_qty = 0;

    for order in orders {
        if order.is_sold {
            summary.realized_profit += order.profit;
        } else if order.is_purchased {
            summary.on_market_value += order.buy_sum();
            on_market_qty += order.quantity;
        } else {
            summary.not_taken_value += order.buy_sum();
        }
    }

    summary.liquidation_value = on_market_qty as f64 * last_price;
    summary.liquidation_profit = summary.liquidation_value - summary.on_market_value;
    summary
}

/// Midnight-to-midnight UTC window of the day before `now`
pub fn prior_day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::default()));
    (midnight - Duration::days(1), midnight)
}
