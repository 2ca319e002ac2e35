// Account provisioning and pre-trade checks
use crate::api::{AccountService, OrderGateway};
use crate::config::{AccountConfig, TradeParams};
use crate::models::{AccountStatus, Operation, Order, Position};
use crate::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// What the account currently holds in one instrument
#[derive(Debug, Clone)]
pub struct InstrumentSnapshot {
    pub position: Option<Position>,
    pub operations: Vec<Operation>,
    pub active_order: Option<Order>,
}

pub struct AccountManager {
    accounts: Arc<dyn AccountService>,
    gateway: Arc<dyn OrderGateway>,
}

impl AccountManager {
    pub fn new(accounts: Arc<dyn AccountService>, gateway: Arc<dyn OrderGateway>) -> Self {
        Self { accounts, gateway }
    }

    /// Validate `params`, resolve the account into it and inspect the instrument
    ///
    /// Parameter limits are checked before any broker call, so a bad
    /// configuration never opens or funds an account.
    ///
    /// # Arguments
    /// * `params` - Run parameters; `account_id` is filled in here
    /// * `account` - Fixed account id, or the deposit for a new one
    pub async fn prepare(
        &self,
        params: &mut TradeParams,
        account: &AccountConfig,
    ) -> Result<InstrumentSnapshot> {
        params.validate_limits()?;

        params.account_id = match account.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                self.get_or_create_open_account(account.initial_deposit, &account.currency)
                    .await?
            }
        };
        params.validate()?;

        self.inspect_instrument(&params.account_id, &params.figi)
            .await
    }

    /// Reuse the first open account, or open and fund a new one
    ///
    /// # Arguments
    /// * `initial_deposit` - Amount paid into a newly opened account
    /// * `currency` - Deposit currency code
    pub async fn get_or_create_open_account(
        &self,
        initial_deposit: i64,
        currency: &str,
    ) -> Result<String> {
        let accounts = self.accounts.list_accounts().await?;

        if let Some(account) = accounts
            .into_iter()
            .find(|a| a.status == AccountStatus::Open && !a.id.is_empty())
        {
            tracing::info!(account_id = %account.id, name = %account.name, "Using open account");
            return Ok(account.id);
        }

        let account_id = self.accounts.open_account().await?;
        tracing::info!(account_id = %account_id, "Opened account");

        if initial_deposit > 0 {
            let balance = self
                .accounts
                .pay_in(&account_id, initial_deposit, currency)
                .await?;
            tracing::info!(account_id = %account_id, balance, currency, "Account funded");
        }

        Ok(account_id)
    }

    /// Log the position, last day of operations and active order for `figi`
    pub async fn inspect_instrument(&self, account_id: &str, figi: &str) -> Result<InstrumentSnapshot> {
        let position = self.gateway.get_open_position(account_id, figi).await?;
        tracing::info!(account_id, figi, position = ?position, "Open position");

        let to = Utc::now();
        let operations = self
            .accounts
            .executed_operations(account_id, figi, to - Duration::hours(24), to)
            .await?;
        tracing::info!(account_id, figi, count = operations.len(), "Executed operations");
        for op in &operations {
            tracing::debug!(
                id = %op.id,
                kind = %op.kind,
                quantity = op.quantity,
                payment = op.payment,
                "Operation"
            );
        }

        let active_order = self.gateway.get_active_order(account_id, figi).await?;
        tracing::info!(account_id, figi, active_order = ?active_order, "Active order");

        Ok(InstrumentSnapshot {
            position,
            operations,
            active_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PaperBroker;
    use crate::error::Error;
    use crate::models::{Account, Instrument, OrderRequest, OrderSide};

    const FIGI: &str = "BBG004730N88";

    fn manager(broker: &Arc<PaperBroker>) -> AccountManager {
        AccountManager::new(broker.clone(), broker.clone())
    }

    #[tokio::test]
    async fn test_reuses_open_account() {
        let broker = Arc::new(PaperBroker::new());
        broker.add_account(Account {
            id: "closed-1".to_string(),
            name: "old".to_string(),
            status: AccountStatus::Closed,
        });
        broker.add_account(Account {
            id: "open-1".to_string(),
            name: "main".to_string(),
            status: AccountStatus::Open,
        });

        let id = manager(&broker)
            .get_or_create_open_account(3000, "rub")
            .await
            .unwrap();

        assert_eq!(id, "open-1");
        assert_eq!(broker.balance("open-1"), 0.0);
    }

    #[tokio::test]
    async fn test_opens_and_funds_new_account() {
        let broker = Arc::new(PaperBroker::new());
        broker.add_account(Account {
            id: String::new(),
            name: "broken".to_string(),
            status: AccountStatus::Open,
        });

        let id = manager(&broker)
            .get_or_create_open_account(3000, "rub")
            .await
            .unwrap();

        assert!(!id.is_empty());
        assert_eq!(broker.balance(&id), 3000.0);
    }

    #[tokio::test]
    async fn test_prepare_rejects_config_before_broker_calls() {
        let broker = Arc::new(PaperBroker::new());
        let mut params = TradeParams::new("", FIGI);
        params.max_deal_sum = 5000.0;
        params.deal_limit = 3000.0;

        let result = manager(&broker)
            .prepare(&mut params, &AccountConfig::default())
            .await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert!(params.account_id.is_empty());
        // No account was opened or funded
        assert!(broker.list_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_resolves_account() {
        let broker = Arc::new(PaperBroker::new());
        let mut params = TradeParams::new("", FIGI);

        let snapshot = manager(&broker)
            .prepare(&mut params, &AccountConfig::default())
            .await
            .unwrap();

        assert!(!params.account_id.is_empty());
        assert_eq!(broker.balance(&params.account_id), 3000.0);
        assert!(snapshot.position.is_none());

        // A configured id is used as is
        let fixed = AccountConfig {
            id: Some("fixed-1".to_string()),
            ..AccountConfig::default()
        };
        manager(&broker).prepare(&mut params, &fixed).await.unwrap();
        assert_eq!(params.account_id, "fixed-1");
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let broker = Arc::new(PaperBroker::new());
        broker.fail_operation("list_accounts");

        let result = manager(&broker).get_or_create_open_account(3000, "rub").await;
        assert!(matches!(
            result,
            Err(Error::Network { operation: "list_accounts", .. })
        ));
    }

    #[tokio::test]
    async fn test_inspect_instrument() {
        let broker = Arc::new(PaperBroker::new());
        broker.add_instrument(Instrument {
            figi: FIGI.to_string(),
            ticker: "SBER".to_string(),
            name: "Sberbank".to_string(),
            lot: 10,
            currency: "rub".to_string(),
        });
        // Fills on placement
        broker
            .place_order(&OrderRequest {
                account_id: "acc".to_string(),
                figi: FIGI.to_string(),
                side: OrderSide::Buy,
                limit_price: 250.0,
                quantity: 2,
            })
            .await
            .unwrap();

        let snapshot = manager(&broker).inspect_instrument("acc", FIGI).await.unwrap();

        assert_eq!(snapshot.position.map(|p| p.balance), Some(2));
        assert_eq!(snapshot.operations.len(), 1);
        assert_eq!(snapshot.operations[0].payment, -5000.0);
        assert!(snapshot.active_order.is_none());
    }
}
