use super::{AccountService, MarketData, OrderGateway};
use crate::error::Error;
use crate::models::{
    Account, AccountStatus, Candle, CandleInterval, Instrument, Operation, Order, OrderRequest,
    OrderSide, OrderStatus, Position,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// In-memory broker for paper trading and tests
///
/// Orders stay pending for a configurable number of state queries and then
/// fill at their limit price. Failures can be injected per operation name
/// (`"get_order_state"`, `"place_order"`, ...).
pub struct PaperBroker {
    state: Mutex<PaperState>,
}

#[derive(Default)]
struct PaperState {
    instruments: HashMap<String, Instrument>,
    candles: HashMap<String, Vec<Candle>>,
    accounts: Vec<Account>,
    balances: HashMap<String, f64>,
    orders: Vec<PaperOrder>,
    positions: HashMap<(String, String), Position>,
    operations: Vec<(String, Operation)>,
    fill_after_polls: u32,
    reject_orders: bool,
    failing: HashSet<&'static str>,
    orders_placed: usize,
    state_queries: usize,
    next_id: u64,
}

struct PaperOrder {
    order: Order,
    polls: u32,
}

impl PaperState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check_failure(&self, operation: &'static str) -> Result<()> {
        if self.failing.contains(operation) {
            return Err(Error::network(
                operation,
                anyhow::anyhow!("injected paper broker failure"),
            ));
        }
        Ok(())
    }

    fn fill(&mut self, index: usize) {
        let order = self.orders[index].order.clone();
        self.orders[index].order.status = OrderStatus::Filled;

        let key = (order.account_id.clone(), order.figi.clone());
        let position = self.positions.entry(key.clone()).or_insert_with(|| Position {
            figi: order.figi.clone(),
            balance: 0,
            exchange_blocked: false,
        });
        let lot = self
            .instruments
            .get(&order.figi)
            .map(|i| i.lot)
            .unwrap_or(1);
        let amount = order.limit_price * (order.quantity * lot) as f64;

        let (kind, payment) = match order.side {
            OrderSide::Buy => {
                position.balance += order.quantity;
                ("buy", -amount)
            }
            OrderSide::Sell => {
                position.balance -= order.quantity;
                ("sell", amount)
            }
        };
        if position.balance <= 0 {
            self.positions.remove(&key);
        }
        *self.balances.entry(order.account_id.clone()).or_insert(0.0) += payment;

        let operation = Operation {
            id: self.next_id("op"),
            figi: order.figi.clone(),
            kind: kind.to_string(),
            quantity: order.quantity,
            payment,
            date: Utc::now(),
        };
        self.operations.push((order.account_id.clone(), operation));

        tracing::debug!(order_id = %order.id, side = %order.side, "Paper order filled");
    }
}

impl PaperBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PaperState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PaperState>> {
        self.state
            .lock()
            .map_err(|e| Error::network("paper_broker", anyhow::anyhow!(e.to_string())))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PaperState) -> T) -> T {
        match self.state.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn add_instrument(&self, instrument: Instrument) {
        self.with_state(|s| {
            s.instruments.insert(instrument.figi.clone(), instrument);
        });
    }

    pub fn add_candles(&self, figi: &str, candles: Vec<Candle>) {
        self.with_state(|s| {
            let stored = s.candles.entry(figi.to_string()).or_default();
            stored.extend(candles);
            stored.sort_by_key(|c| c.time);
        });
    }

    pub fn add_account(&self, account: Account) {
        self.with_state(|s| s.accounts.push(account));
    }

    /// Number of state queries a new order stays pending for
    pub fn set_fill_after_polls(&self, polls: u32) {
        self.with_state(|s| s.fill_after_polls = polls);
    }

    /// Reject every order placed from now on
    pub fn set_reject_orders(&self, reject: bool) {
        self.with_state(|s| s.reject_orders = reject);
    }

    /// Make every call of `operation` fail with a network error
    pub fn fail_operation(&self, operation: &'static str) {
        self.with_state(|s| {
            s.failing.insert(operation);
        });
    }

    pub fn set_position(&self, account_id: &str, figi: &str, balance: i64, exchange_blocked: bool) {
        self.with_state(|s| {
            s.positions.insert(
                (account_id.to_string(), figi.to_string()),
                Position {
                    figi: figi.to_string(),
                    balance,
                    exchange_blocked,
                },
            );
        });
    }

    /// Broker-side cancellation of a pending order
    pub fn cancel_order(&self, order_id: &str) -> bool {
        self.with_state(|s| {
            match s
                .orders
                .iter_mut()
                .find(|o| o.order.id == order_id && o.order.status == OrderStatus::Pending)
            {
                Some(o) => {
                    o.order.status = OrderStatus::Cancelled;
                    true
                }
                None => false,
            }
        })
    }

    pub fn orders(&self) -> Vec<Order> {
        self.with_state(|s| s.orders.iter().map(|o| o.order.clone()).collect())
    }

    pub fn orders_placed(&self) -> usize {
        self.with_state(|s| s.orders_placed)
    }

    pub fn state_queries(&self) -> usize {
        self.with_state(|s| s.state_queries)
    }

    pub fn balance(&self, account_id: &str) -> f64 {
        self.with_state(|s| s.balances.get(account_id).copied().unwrap_or(0.0))
    }

    pub fn position(&self, account_id: &str, figi: &str) -> Option<Position> {
        self.with_state(|s| {
            s.positions
                .get(&(account_id.to_string(), figi.to_string()))
                .cloned()
        })
    }
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for PaperBroker {
    async fn get_instrument(&self, figi: &str) -> Result<Instrument> {
        let state = self.lock()?;
        state.check_failure("get_instrument")?;
        state
            .instruments
            .get(figi)
            .cloned()
            .ok_or_else(|| Error::UnknownInstrument(figi.to_string()))
    }

    async fn get_candles(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        _interval: CandleInterval,
    ) -> Result<Vec<Candle>> {
        let state = self.lock()?;
        state.check_failure("get_candles")?;
        Ok(state
            .candles
            .get(figi)
            .map(|candles| {
                candles
                    .iter()
                    .filter(|c| c.time >= from && c.time < to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl OrderGateway for PaperBroker {
    async fn place_order(&self, request: &OrderRequest) -> Result<String> {
        let mut state = self.lock()?;
        state.check_failure("place_order")?;

        state.orders_placed += 1;
        let id = state.next_id("paper");
        let status = if state.reject_orders {
            OrderStatus::Rejected
        } else {
            OrderStatus::Pending
        };

        state.orders.push(PaperOrder {
            order: Order {
                id: id.clone(),
                account_id: request.account_id.clone(),
                figi: request.figi.clone(),
                side: request.side,
                limit_price: request.limit_price,
                quantity: request.quantity,
                status,
            },
            polls: 0,
        });

        if status.is_failed() {
            return Err(Error::OrderRejected {
                order_id: id,
                status,
            });
        }

        if state.fill_after_polls == 0 {
            let index = state.orders.len() - 1;
            state.fill(index);
        }

        Ok(id)
    }

    async fn get_order_state(&self, account_id: &str, order_id: &str) -> Result<OrderStatus> {
        let mut state = self.lock()?;
        state.check_failure("get_order_state")?;
        state.state_queries += 1;

        let fill_after = state.fill_after_polls;
        let index = state
            .orders
            .iter()
            .position(|o| o.order.id == order_id && o.order.account_id == account_id)
            .ok_or_else(|| {
                Error::network(
                    "get_order_state",
                    anyhow::anyhow!("order {} not found", order_id),
                )
            })?;

        if state.orders[index].order.status == OrderStatus::Pending {
            state.orders[index].polls += 1;
            if state.orders[index].polls >= fill_after {
                state.fill(index);
            }
        }

        Ok(state.orders[index].order.status)
    }

    async fn get_open_position(&self, account_id: &str, figi: &str) -> Result<Option<Position>> {
        let state = self.lock()?;
        state.check_failure("get_open_position")?;
        Ok(state
            .positions
            .get(&(account_id.to_string(), figi.to_string()))
            .filter(|p| p.balance > 0 || p.exchange_blocked)
            .cloned())
    }

    async fn get_active_order(&self, account_id: &str, figi: &str) -> Result<Option<Order>> {
        let state = self.lock()?;
        state.check_failure("get_active_order")?;
        Ok(state
            .orders
            .iter()
            .map(|o| &o.order)
            .find(|o| {
                o.account_id == account_id && o.figi == figi && o.status == OrderStatus::Pending
            })
            .cloned())
    }
}

#[async_trait]
impl AccountService for PaperBroker {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let state = self.lock()?;
        state.check_failure("list_accounts")?;
        Ok(state.accounts.clone())
    }

    async fn open_account(&self) -> Result<String> {
        let mut state = self.lock()?;
        state.check_failure("open_account")?;
        let id = state.next_id("paper-account");
        state.accounts.push(Account {
            id: id.clone(),
            name: "paper".to_string(),
            status: AccountStatus::Open,
        });
        Ok(id)
    }

    async fn pay_in(&self, account_id: &str, amount: i64, _currency: &str) -> Result<f64> {
        let mut state = self.lock()?;
        state.check_failure("pay_in")?;
        let balance = state.balances.entry(account_id.to_string()).or_insert(0.0);
        *balance += amount as f64;
        Ok(*balance)
    }

    async fn executed_operations(
        &self,
        account_id: &str,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Operation>> {
        let state = self.lock()?;
        state.check_failure("executed_operations")?;
        Ok(state
            .operations
            .iter()
            .filter(|(acc, op)| acc == account_id && op.figi == figi)
            .filter(|(_, op)| op.date >= from && op.date <= to)
            .map(|(_, op)| op.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sber() -> Instrument {
        Instrument {
            figi: "BBG004730N88".to_string(),
            ticker: "SBER".to_string(),
            name: "Sberbank".to_string(),
            lot: 10,
            currency: "rub".to_string(),
        }
    }

    fn buy_request(quantity: i64) -> OrderRequest {
        OrderRequest {
            account_id: "acc".to_string(),
            figi: "BBG004730N88".to_string(),
            side: OrderSide::Buy,
            limit_price: 100.0,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_order_fills_after_polls() {
        let broker = PaperBroker::new();
        broker.add_instrument(sber());
        broker.set_fill_after_polls(2);

        let id = broker.place_order(&buy_request(3)).await.unwrap();
        assert!(broker
            .get_active_order("acc", "BBG004730N88")
            .await
            .unwrap()
            .is_some());

        assert_eq!(
            broker.get_order_state("acc", &id).await.unwrap(),
            OrderStatus::Pending
        );
        assert_eq!(
            broker.get_order_state("acc", &id).await.unwrap(),
            OrderStatus::Filled
        );

        let position = broker
            .get_open_position("acc", "BBG004730N88")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.balance, 3);
        assert!(broker
            .get_active_order("acc", "BBG004730N88")
            .await
            .unwrap()
            .is_none());
        // 3 lots of 10 at 100
        assert_eq!(broker.balance("acc"), -3000.0);
    }

    #[tokio::test]
    async fn test_rejected_order() {
        let broker = PaperBroker::new();
        broker.set_reject_orders(true);

        let result = broker.place_order(&buy_request(1)).await;
        assert!(matches!(result, Err(Error::OrderRejected { .. })));
        assert_eq!(broker.orders_placed(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let broker = PaperBroker::new();
        broker.fail_operation("get_candles");

        let result = broker
            .get_candles("X", Utc::now(), Utc::now(), CandleInterval::FiveMinutes)
            .await;
        assert!(matches!(
            result,
            Err(Error::Network {
                operation: "get_candles",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_accounts_and_pay_in() {
        let broker = PaperBroker::new();
        let id = broker.open_account().await.unwrap();

        let accounts = broker.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].status, AccountStatus::Open);

        assert_eq!(broker.pay_in(&id, 3000, "rub").await.unwrap(), 3000.0);
    }
}
