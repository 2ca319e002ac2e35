// Brokerage collaborators: contracts and adapters
pub mod paper;
pub mod tinkoff;

pub use paper::PaperBroker;
pub use tinkoff::TinkoffClient;

use crate::models::{
    Account, Candle, CandleInterval, Instrument, Operation, Order, OrderRequest, OrderStatus,
    Position,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Instrument metadata and historical candles
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn get_instrument(&self, figi: &str) -> Result<Instrument>;

    /// Candles in `[from, to)`, ordered oldest to newest; may be empty
    async fn get_candles(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>>;
}

/// Order placement and state queries
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit a limit order and return its id
    ///
    /// # Errors
    /// `OrderRejected` when the broker immediately rejects or cancels it.
    async fn place_order(&self, request: &OrderRequest) -> Result<String>;

    async fn get_order_state(&self, account_id: &str, order_id: &str) -> Result<OrderStatus>;

    /// Open position with a positive balance, if any
    ///
    /// The balance counts whole lots; pieces short of a lot are not reported.
    async fn get_open_position(&self, account_id: &str, figi: &str) -> Result<Option<Position>>;

    /// First not-yet-finished order for the instrument, if any
    async fn get_active_order(&self, account_id: &str, figi: &str) -> Result<Option<Order>>;
}

/// Account provisioning and bookkeeping
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    async fn open_account(&self) -> Result<String>;

    /// Deposit funds and return the new balance
    async fn pay_in(&self, account_id: &str, amount: i64, currency: &str) -> Result<f64>;

    async fn executed_operations(
        &self,
        account_id: &str,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Operation>>;
}

/// Handles to the collaborators a strategy works with
#[derive(Clone)]
pub struct Collaborators {
    pub market: Arc<dyn MarketData>,
    pub gateway: Arc<dyn OrderGateway>,
}

impl Collaborators {
    pub fn new(market: Arc<dyn MarketData>, gateway: Arc<dyn OrderGateway>) -> Self {
        Self { market, gateway }
    }

    /// Both roles served by one broker
    pub fn from_broker<B>(broker: Arc<B>) -> Self
    where
        B: MarketData + OrderGateway + 'static,
    {
        Self {
            market: broker.clone(),
            gateway: broker,
        }
    }
}
