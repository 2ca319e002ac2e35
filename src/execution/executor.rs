use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::api::{MarketData, OrderGateway};
use crate::config::TradeParams;
use crate::error::Error;
use crate::execution::sizing::calc_lot_count;
use crate::models::{Instrument, OrderRequest, OrderSide, OrderStatus, PriceBand};
use crate::Result;

/// Where the live cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Validating,
    FetchingInstrument,
    ComputingBand,
    Buying,
    WaitingBuyFill,
    Selling,
    WaitingSellFill,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    Filled,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyOutcome {
    Filled { order_id: String },
    /// An open position already exists; no order was placed
    AlreadyHeld,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellOutcome {
    Filled { order_id: String },
    /// Neither an active order nor an open position exists
    NothingToSell,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Cancelled,
    SimulationFinished,
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycles_completed: u64,
    pub stop_reason: StopReason,
}

enum CycleOutcome {
    Completed,
    NothingToSell,
    Cancelled,
}

/// Live buy-then-sell cycle against the order gateway
///
/// Each cycle validates the parameters, computes a fresh band from the last
/// `analysis_period` of candles, buys at the band's buy price, then sells the
/// whole position at its sell price. Cycles repeat until the token is
/// cancelled or a step fails.
pub struct BandExecutor {
    market: Arc<dyn MarketData>,
    gateway: Arc<dyn OrderGateway>,
    state: CycleState,
}

impl BandExecutor {
    pub fn new(market: Arc<dyn MarketData>, gateway: Arc<dyn OrderGateway>) -> Self {
        Self {
            market,
            gateway,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    fn transition(&mut self, next: CycleState) {
        tracing::debug!(from = ?self.state, to = ?next, "Execution state");
        self.state = next;
    }

    /// Trade until cancelled
    ///
    /// Returns `Ok` when the token is cancelled, either between cycles or
    /// while an order is being awaited. Any step failure ends the run.
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
        params: &TradeParams,
    ) -> Result<RunSummary> {
        let mut cycles_completed = 0;

        loop {
            if cancel.is_cancelled() {
                tracing::info!(cycles_completed, "Strategy cancelled");
                self.transition(CycleState::Idle);
                return Ok(RunSummary {
                    cycles_completed,
                    stop_reason: StopReason::Cancelled,
                });
            }

            match self.run_cycle(cancel, params).await {
                Ok(CycleOutcome::Completed) => {
                    cycles_completed += 1;
                    tracing::info!(cycles_completed, figi = %params.figi, "Trade cycle completed");
                }
                Ok(CycleOutcome::NothingToSell) => {
                    tracing::warn!(
                        account_id = %params.account_id,
                        figi = %params.figi,
                        "Nothing to sell, restarting cycle"
                    );
                    // Back off one poll before the next cycle
                    self.sleep_or_cancel(cancel, params.poll_interval).await;
                }
                Ok(CycleOutcome::Cancelled) => {
                    tracing::info!(cycles_completed, "Strategy cancelled");
                    self.transition(CycleState::Idle);
                    return Ok(RunSummary {
                        cycles_completed,
                        stop_reason: StopReason::Cancelled,
                    });
                }
                Err(e) => {
                    self.transition(CycleState::Failed);
                    tracing::error!(error = %e, figi = %params.figi, "Trade cycle failed");
                    return Err(e);
                }
            }
        }
    }

    async fn run_cycle(
        &mut self,
        cancel: &CancellationToken,
        params: &TradeParams,
    ) -> Result<CycleOutcome> {
        self.transition(CycleState::Validating);
        params.validate()?;

        self.transition(CycleState::FetchingInstrument);
        let instrument = self.market.get_instrument(&params.figi).await?;

        self.transition(CycleState::ComputingBand);
        let band = self.compute_band(params).await?;
        tracing::info!(
            figi = %instrument.figi,
            buy = band.buy_price,
            sell = band.sell_price,
            "Band computed"
        );

        self.transition(CycleState::Buying);
        match self.buy_step(cancel, params, &instrument, band).await? {
            BuyOutcome::Cancelled => return Ok(CycleOutcome::Cancelled),
            BuyOutcome::Filled { .. } | BuyOutcome::AlreadyHeld => {}
        }

        self.transition(CycleState::Selling);
        let outcome = match self.sell_step(cancel, params, band).await? {
            SellOutcome::Filled { .. } => CycleOutcome::Completed,
            SellOutcome::NothingToSell => CycleOutcome::NothingToSell,
            SellOutcome::Cancelled => CycleOutcome::Cancelled,
        };

        self.transition(CycleState::Idle);
        Ok(outcome)
    }

    async fn compute_band(&self, params: &TradeParams) -> Result<PriceBand> {
        let to = Utc::now();
        let lookback = chrono::Duration::from_std(params.analysis_period)
            .map_err(|e| Error::Config(format!("analysis period out of range: {}", e)))?;
        let candles = self
            .market
            .get_candles(&params.figi, to - lookback, to, params.interval)
            .await?;

        params.analyzer.compute_band(&candles)
    }

    /// Buy at the band's buy price unless a position is already held
    ///
    /// An order still working for the instrument is awaited instead of
    /// placing a new one.
    pub async fn buy_step(
        &mut self,
        cancel: &CancellationToken,
        params: &TradeParams,
        instrument: &Instrument,
        band: PriceBand,
    ) -> Result<BuyOutcome> {
        let account_id = params.account_id.as_str();

        let order_id = match self
            .gateway
            .get_active_order(account_id, &instrument.figi)
            .await?
        {
            Some(order) => {
                tracing::info!(
                    order_id = %order.id,
                    side = %order.side,
                    "Reusing active order"
                );
                order.id
            }
            None => {
                if let Some(position) = self
                    .gateway
                    .get_open_position(account_id, &instrument.figi)
                    .await?
                {
                    if position.exchange_blocked {
                        return Err(Error::PositionBlocked {
                            figi: position.figi,
                        });
                    }
                    if position.balance > 0 {
                        tracing::warn!(
                            account_id,
                            figi = %instrument.figi,
                            balance = position.balance,
                            "Found open position"
                        );
                        return Ok(BuyOutcome::AlreadyHeld);
                    }
                }

                let lots = calc_lot_count(
                    params.max_deal_sum,
                    band.buy_price,
                    instrument.lot,
                    params.operation_lots,
                );
                if lots < 1 {
                    return Err(Error::InsufficientQuantity { lots });
                }

                self.gateway
                    .place_order(&OrderRequest {
                        account_id: account_id.to_string(),
                        figi: instrument.figi.clone(),
                        side: OrderSide::Buy,
                        limit_price: band.buy_price,
                        quantity: lots,
                    })
                    .await?
            }
        };

        self.transition(CycleState::WaitingBuyFill);
        match self.wait_fill(cancel, params, &order_id).await? {
            FillOutcome::Filled => Ok(BuyOutcome::Filled { order_id }),
            FillOutcome::Cancelled => Ok(BuyOutcome::Cancelled),
        }
    }

    /// Sell the whole open position at the band's sell price
    pub async fn sell_step(
        &mut self,
        cancel: &CancellationToken,
        params: &TradeParams,
        band: PriceBand,
    ) -> Result<SellOutcome> {
        let account_id = params.account_id.as_str();
        let figi = params.figi.as_str();

        let order_id = match self.gateway.get_active_order(account_id, figi).await? {
            Some(order) => {
                tracing::info!(order_id = %order.id, side = %order.side, "Reusing active order");
                order.id
            }
            None => {
                let position = match self.gateway.get_open_position(account_id, figi).await? {
                    Some(p) if p.exchange_blocked => {
                        return Err(Error::PositionBlocked { figi: p.figi });
                    }
                    Some(p) if p.balance > 0 => p,
                    _ => return Ok(SellOutcome::NothingToSell),
                };

                self.gateway
                    .place_order(&OrderRequest {
                        account_id: account_id.to_string(),
                        figi: figi.to_string(),
                        side: OrderSide::Sell,
                        limit_price: band.sell_price,
                        quantity: position.balance,
                    })
                    .await?
            }
        };

        self.transition(CycleState::WaitingSellFill);
        match self.wait_fill(cancel, params, &order_id).await? {
            FillOutcome::Filled => Ok(SellOutcome::Filled { order_id }),
            FillOutcome::Cancelled => Ok(SellOutcome::Cancelled),
        }
    }

    /// Poll the order every `poll_interval` until it fills
    ///
    /// Cancellation wins over a pending poll. A gateway error while polling
    /// is not retried.
    pub async fn wait_fill(
        &self,
        cancel: &CancellationToken,
        params: &TradeParams,
        order_id: &str,
    ) -> Result<FillOutcome> {
        tracing::info!(account_id = %params.account_id, order_id, "Waiting for order");

        loop {
            if self.sleep_or_cancel(cancel, params.poll_interval).await {
                tracing::info!(order_id, "Wait cancelled");
                return Ok(FillOutcome::Cancelled);
            }

            let status = self
                .gateway
                .get_order_state(&params.account_id, order_id)
                .await?;

            match status {
                OrderStatus::Filled => {
                    tracing::info!(order_id, "Order filled");
                    return Ok(FillOutcome::Filled);
                }
                OrderStatus::Rejected | OrderStatus::Cancelled => {
                    return Err(Error::OrderRejected {
                        order_id: order_id.to_string(),
                        status,
                    });
                }
                OrderStatus::Pending => {
                    tracing::debug!(order_id, "Order still pending");
                }
            }
        }
    }

    /// Sleep for `period`; true when cancelled first
    async fn sleep_or_cancel(&self, cancel: &CancellationToken, period: Duration) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(period) => false,
        }
    }
}
