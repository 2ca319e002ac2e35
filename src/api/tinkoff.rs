use super::{AccountService, MarketData, OrderGateway};
use crate::config::BrokerConfig;
use crate::error::Error;
use crate::models::{
    Account, AccountStatus, Candle, CandleInterval, Instrument, Operation, Order, OrderRequest,
    OrderSide, OrderStatus, Position,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const SERVICE_PREFIX: &str = "tinkoff.public.invest.api.contract.v1";
const NANOS_PER_UNIT: f64 = 1_000_000_000.0;

type BrokerRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Client for the Tinkoff Invest sandbox REST gateway
///
/// Every call is a JSON POST to `{base_url}/{service}/{method}` with a bearer
/// token. Transport and HTTP failures surface as `Error::Network` tagged with
/// the operation name.
#[derive(Clone)]
pub struct TinkoffClient {
    client: Client,
    base_url: String,
    token: String,
    rate_limiter: Arc<BrokerRateLimiter>,
}

// ============== Wire Types ==============

/// Fixed-point price: `units + nano / 10^9`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Quotation {
    #[serde(with = "int64")]
    pub units: i64,
    pub nano: i32,
}

impl Quotation {
    pub fn from_price(price: f64) -> Self {
        let mut units = price.trunc() as i64;
        let mut nano = ((price - units as f64) * NANOS_PER_UNIT).round() as i64;
        if nano.abs() >= NANOS_PER_UNIT as i64 {
            units += nano.signum();
            nano -= nano.signum() * NANOS_PER_UNIT as i64;
        }
        Self {
            units,
            nano: nano as i32,
        }
    }

    pub fn to_price(&self) -> f64 {
        self.units as f64 + self.nano as f64 / NANOS_PER_UNIT
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct MoneyValue {
    currency: String,
    #[serde(with = "int64")]
    units: i64,
    nano: i32,
}

impl MoneyValue {
    fn to_amount(&self) -> f64 {
        Quotation {
            units: self.units,
            nano: self.nano,
        }
        .to_price()
    }
}

/// int64 fields travel as JSON strings
mod int64 {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Number(n) => Ok(n),
        }
    }
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentRequest<'a> {
    id_type: &'static str,
    id: &'a str,
}

#[derive(Deserialize)]
struct ShareResponse {
    instrument: Option<ShareRaw>,
}

#[derive(Deserialize)]
struct ShareRaw {
    figi: String,
    ticker: String,
    #[serde(default)]
    name: String,
    lot: i64,
    #[serde(default)]
    currency: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetCandlesRequest<'a> {
    figi: &'a str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    interval: &'static str,
}

#[derive(Deserialize)]
struct GetCandlesResponse {
    #[serde(default)]
    candles: Vec<HistoricCandleRaw>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoricCandleRaw {
    open: Quotation,
    high: Quotation,
    low: Quotation,
    close: Quotation,
    #[serde(with = "int64")]
    volume: i64,
    time: DateTime<Utc>,
    is_complete: bool,
}

impl From<HistoricCandleRaw> for Candle {
    fn from(raw: HistoricCandleRaw) -> Self {
        Candle {
            time: raw.time,
            open: raw.open.to_price(),
            high: raw.high.to_price(),
            low: raw.low.to_price(),
            close: raw.close.to_price(),
            volume: raw.volume,
            is_complete: raw.is_complete,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostOrderRequest<'a> {
    figi: &'a str,
    #[serde(with = "int64")]
    quantity: i64,
    price: Quotation,
    direction: &'static str,
    account_id: &'a str,
    order_type: &'static str,
    order_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostOrderResponse {
    order_id: String,
    execution_report_status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderStateRequest<'a> {
    account_id: &'a str,
    order_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountRequest<'a> {
    account_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderStateRaw {
    order_id: String,
    #[serde(default)]
    figi: String,
    #[serde(default)]
    direction: String,
    #[serde(default, with = "int64")]
    lots_requested: i64,
    #[serde(default)]
    initial_security_price: Option<MoneyValue>,
    execution_report_status: String,
}

#[derive(Deserialize)]
struct OrdersResponse {
    #[serde(default)]
    orders: Vec<OrderStateRaw>,
}

#[derive(Deserialize)]
struct PositionsResponse {
    #[serde(default)]
    securities: Vec<SecurityRaw>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecurityRaw {
    figi: String,
    #[serde(with = "int64")]
    balance: i64,
    #[serde(default)]
    exchange_blocked: bool,
}

#[derive(Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<AccountRaw>,
}

#[derive(Deserialize)]
struct AccountRaw {
    id: String,
    #[serde(default)]
    name: String,
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenAccountResponse {
    account_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PayInRequest<'a> {
    account_id: &'a str,
    amount: MoneyValue,
}

#[derive(Deserialize)]
struct PayInResponse {
    balance: Option<MoneyValue>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationsRequest<'a> {
    account_id: &'a str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    state: &'static str,
    figi: &'a str,
}

#[derive(Deserialize)]
struct OperationsResponse {
    #[serde(default)]
    operations: Vec<OperationRaw>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationRaw {
    id: String,
    #[serde(default)]
    figi: String,
    #[serde(default)]
    operation_type: String,
    #[serde(default)]
    payment: MoneyValue,
    #[serde(default, with = "int64")]
    quantity: i64,
    date: DateTime<Utc>,
}

fn parse_status(raw: &str) -> OrderStatus {
    match raw {
        "EXECUTION_REPORT_STATUS_FILL" => OrderStatus::Filled,
        "EXECUTION_REPORT_STATUS_REJECTED" => OrderStatus::Rejected,
        "EXECUTION_REPORT_STATUS_CANCELLED" => OrderStatus::Cancelled,
        // NEW, PARTIALLYFILL and unspecified are still working
        _ => OrderStatus::Pending,
    }
}

fn parse_account_status(raw: &str) -> AccountStatus {
    match raw {
        "ACCOUNT_STATUS_OPEN" => AccountStatus::Open,
        "ACCOUNT_STATUS_CLOSED" => AccountStatus::Closed,
        _ => AccountStatus::New,
    }
}

fn direction(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "ORDER_DIRECTION_BUY",
        OrderSide::Sell => "ORDER_DIRECTION_SELL",
    }
}

// ============== Implementation ==============

impl TinkoffClient {
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(Error::Config("broker token is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::network("build_http_client", e))?;

        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            rate_limiter,
        })
    }

    /// Make a rate-limited gateway call
    async fn call<Req, Resp>(
        &self,
        operation: &'static str,
        service: &str,
        method: &str,
        body: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}.{}/{}", self.base_url, SERVICE_PREFIX, service, method);
        tracing::debug!(%url, "Broker request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::network(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::network(
                operation,
                anyhow::anyhow!("broker API error ({}): {}", status, text),
            ));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| Error::network(operation, e))
    }
}

#[async_trait]
impl MarketData for TinkoffClient {
    async fn get_instrument(&self, figi: &str) -> Result<Instrument> {
        let request = InstrumentRequest {
            id_type: "INSTRUMENT_ID_TYPE_FIGI",
            id: figi,
        };
        let response: ShareResponse = self
            .call("get_instrument", "InstrumentsService", "ShareBy", &request)
            .await?;

        let share = response
            .instrument
            .ok_or_else(|| Error::UnknownInstrument(figi.to_string()))?;

        Ok(Instrument {
            figi: share.figi,
            ticker: share.ticker,
            name: share.name,
            lot: share.lot,
            currency: share.currency,
        })
    }

    async fn get_candles(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>> {
        let request = GetCandlesRequest {
            figi,
            from,
            to,
            interval: interval.wire_name(),
        };
        let response: GetCandlesResponse = self
            .call("get_candles", "MarketDataService", "GetCandles", &request)
            .await?;

        Ok(response.candles.into_iter().map(Candle::from).collect())
    }
}

#[async_trait]
impl OrderGateway for TinkoffClient {
    async fn place_order(&self, request: &OrderRequest) -> Result<String> {
        let body = PostOrderRequest {
            figi: &request.figi,
            quantity: request.quantity,
            price: Quotation::from_price(request.limit_price),
            direction: direction(request.side),
            account_id: &request.account_id,
            order_type: "ORDER_TYPE_LIMIT",
            order_id: uuid::Uuid::new_v4().to_string(),
        };

        tracing::info!(
            account_id = %request.account_id,
            figi = %request.figi,
            side = %request.side,
            price = request.limit_price,
            quantity = request.quantity,
            "PostSandboxOrder"
        );

        let response: PostOrderResponse = self
            .call("place_order", "SandboxService", "PostSandboxOrder", &body)
            .await?;

        let status = parse_status(&response.execution_report_status);
        tracing::info!(order_id = %response.order_id, %status, "PostSandboxOrder sent");

        if status.is_failed() {
            return Err(Error::OrderRejected {
                order_id: response.order_id,
                status,
            });
        }

        Ok(response.order_id)
    }

    async fn get_order_state(&self, account_id: &str, order_id: &str) -> Result<OrderStatus> {
        let request = OrderStateRequest {
            account_id,
            order_id,
        };
        let response: OrderStateRaw = self
            .call(
                "get_order_state",
                "SandboxService",
                "GetSandboxOrderState",
                &request,
            )
            .await?;

        Ok(parse_status(&response.execution_report_status))
    }

    async fn get_open_position(&self, account_id: &str, figi: &str) -> Result<Option<Position>> {
        let request = AccountRequest { account_id };
        let response: PositionsResponse = self
            .call(
                "get_open_position",
                "SandboxService",
                "GetSandboxPositions",
                &request,
            )
            .await?;

        let Some(security) = response
            .securities
            .into_iter()
            .find(|s| s.figi == figi && (s.balance > 0 || s.exchange_blocked))
        else {
            return Ok(None);
        };

        // Balance is reported in pieces; only whole lots can be traded
        let lot = self.get_instrument(figi).await?.lot.max(1);
        let odd_pieces = security.balance % lot;
        if odd_pieces != 0 {
            tracing::warn!(
                account_id,
                figi,
                pieces = security.balance,
                lot,
                odd_pieces,
                "Position is not a whole number of lots; odd pieces are left untraded"
            );
        }
        Ok(Some(Position {
            figi: security.figi,
            balance: security.balance / lot,
            exchange_blocked: security.exchange_blocked,
        }))
    }

    async fn get_active_order(&self, account_id: &str, figi: &str) -> Result<Option<Order>> {
        let request = AccountRequest { account_id };
        let response: OrdersResponse = self
            .call(
                "get_active_order",
                "SandboxService",
                "GetSandboxOrders",
                &request,
            )
            .await?;

        Ok(response
            .orders
            .into_iter()
            .find(|o| o.figi == figi)
            .map(|o| Order {
                status: parse_status(&o.execution_report_status),
                side: if o.direction == "ORDER_DIRECTION_SELL" {
                    OrderSide::Sell
                } else {
                    OrderSide::Buy
                },
                limit_price: o
                    .initial_security_price
                    .as_ref()
                    .map(MoneyValue::to_amount)
                    .unwrap_or(0.0),
                quantity: o.lots_requested,
                id: o.order_id,
                account_id: account_id.to_string(),
                figi: o.figi,
            }))
    }
}

#[async_trait]
impl AccountService for TinkoffClient {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let response: AccountsResponse = self
            .call(
                "list_accounts",
                "SandboxService",
                "GetSandboxAccounts",
                &Empty {},
            )
            .await?;

        Ok(response
            .accounts
            .into_iter()
            .map(|a| Account {
                status: parse_account_status(&a.status),
                id: a.id,
                name: a.name,
            })
            .collect())
    }

    async fn open_account(&self) -> Result<String> {
        let response: OpenAccountResponse = self
            .call(
                "open_account",
                "SandboxService",
                "OpenSandboxAccount",
                &Empty {},
            )
            .await?;
        Ok(response.account_id)
    }

    async fn pay_in(&self, account_id: &str, amount: i64, currency: &str) -> Result<f64> {
        let request = PayInRequest {
            account_id,
            amount: MoneyValue {
                currency: currency.to_string(),
                units: amount,
                nano: 0,
            },
        };
        let response: PayInResponse = self
            .call("pay_in", "SandboxService", "SandboxPayIn", &request)
            .await?;

        Ok(response
            .balance
            .as_ref()
            .map(MoneyValue::to_amount)
            .unwrap_or(0.0))
    }

    async fn executed_operations(
        &self,
        account_id: &str,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Operation>> {
        let request = OperationsRequest {
            account_id,
            from,
            to,
            state: "OPERATION_STATE_EXECUTED",
            figi,
        };
        let response: OperationsResponse = self
            .call(
                "executed_operations",
                "SandboxService",
                "GetSandboxOperations",
                &request,
            )
            .await?;

        Ok(response
            .operations
            .into_iter()
            .map(|op| Operation {
                payment: op.payment.to_amount(),
                id: op.id,
                figi: op.figi,
                kind: op.operation_type,
                quantity: op.quantity,
                date: op.date,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const FIGI: &str = "BBG004730N88";

    fn client_for(server: &mockito::ServerGuard) -> TinkoffClient {
        let config = BrokerConfig {
            base_url: server.url(),
            token: "t-test".to_string(),
            request_timeout_secs: 5,
            requests_per_second: 100,
        };
        TinkoffClient::new(&config).unwrap()
    }

    fn path(service: &str, method: &str) -> String {
        format!("/{}.{}/{}", SERVICE_PREFIX, service, method)
    }

    #[test]
    fn test_quotation_conversion() {
        let q = Quotation::from_price(250.37);
        assert_eq!(q.units, 250);
        assert_eq!(q.nano, 370_000_000);
        assert!((q.to_price() - 250.37).abs() < 1e-9);

        let whole = Quotation::from_price(99.0);
        assert_eq!(whole, Quotation { units: 99, nano: 0 });
    }

    #[test]
    fn test_quotation_accepts_numeric_units() {
        let q: Quotation = serde_json::from_str(r#"{"units": 12, "nano": 500000000}"#).unwrap();
        assert_eq!(q.to_price(), 12.5);

        let q: Quotation = serde_json::from_str(r#"{"units": "12", "nano": 0}"#).unwrap();
        assert_eq!(q.units, 12);
    }

    #[test]
    fn test_empty_token_rejected() {
        let config = BrokerConfig::default();
        assert!(matches!(TinkoffClient::new(&config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_get_candles() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", path("MarketDataService", "GetCandles").as_str())
            .match_header("authorization", "Bearer t-test")
            .match_body(Matcher::PartialJsonString(
                r#"{"figi": "BBG004730N88", "interval": "CANDLE_INTERVAL_5_MIN"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{"candles": [
                    {"open": {"units": "250", "nano": 100000000},
                     "high": {"units": "251", "nano": 0},
                     "low": {"units": "249", "nano": 500000000},
                     "close": {"units": "250", "nano": 700000000},
                     "volume": "1200",
                     "time": "2024-03-01T10:00:00Z",
                     "isComplete": true},
                    {"open": {"units": "250", "nano": 700000000},
                     "high": {"units": "252", "nano": 0},
                     "low": {"units": "250", "nano": 0},
                     "close": {"units": "251", "nano": 0},
                     "volume": "300",
                     "time": "2024-03-01T10:05:00Z",
                     "isComplete": false}
                ]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let to = Utc::now();
        let candles = client
            .get_candles(FIGI, to - chrono::Duration::minutes(20), to, CandleInterval::FiveMinutes)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].high, 251.0);
        assert_eq!(candles[0].low, 249.5);
        assert_eq!(candles[0].volume, 1200);
        assert!(candles[0].is_complete);
        assert!(!candles[1].is_complete);
    }

    #[tokio::test]
    async fn test_place_order_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", path("SandboxService", "PostSandboxOrder").as_str())
            .match_body(Matcher::PartialJsonString(
                r#"{"direction": "ORDER_DIRECTION_BUY", "quantity": "2", "orderType": "ORDER_TYPE_LIMIT"}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{"orderId": "o-1", "executionReportStatus": "EXECUTION_REPORT_STATUS_REJECTED"}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let request = OrderRequest {
            account_id: "acc".to_string(),
            figi: FIGI.to_string(),
            side: OrderSide::Buy,
            limit_price: 101.5,
            quantity: 2,
        };

        let result = client.place_order(&request).await;
        assert!(matches!(
            result,
            Err(Error::OrderRejected { ref order_id, status: OrderStatus::Rejected }) if order_id == "o-1"
        ));
    }

    #[tokio::test]
    async fn test_order_state_mapping() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", path("SandboxService", "GetSandboxOrderState").as_str())
            .with_status(200)
            .with_body(r#"{"orderId": "o-1", "executionReportStatus": "EXECUTION_REPORT_STATUS_FILL"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let status = client.get_order_state("acc", "o-1").await.unwrap();
        assert_eq!(status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_open_position_converts_pieces_to_lots() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", path("SandboxService", "GetSandboxPositions").as_str())
            .with_status(200)
            .with_body(
                r#"{"securities": [
                    {"figi": "OTHER", "balance": "5"},
                    {"figi": "BBG004730N88", "balance": "30", "exchangeBlocked": false}
                ]}"#,
            )
            .create_async()
            .await;
        server
            .mock("POST", path("InstrumentsService", "ShareBy").as_str())
            .with_status(200)
            .with_body(
                r#"{"instrument": {"figi": "BBG004730N88", "ticker": "SBER", "name": "Sberbank", "lot": 10, "currency": "rub"}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let position = client.get_open_position("acc", FIGI).await.unwrap().unwrap();
        assert_eq!(position.balance, 3);
        assert!(!position.exchange_blocked);
    }

    #[tokio::test]
    async fn test_open_position_drops_odd_pieces() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", path("SandboxService", "GetSandboxPositions").as_str())
            .with_status(200)
            .with_body(r#"{"securities": [{"figi": "BBG004730N88", "balance": "15"}]}"#)
            .create_async()
            .await;
        server
            .mock("POST", path("InstrumentsService", "ShareBy").as_str())
            .with_status(200)
            .with_body(
                r#"{"instrument": {"figi": "BBG004730N88", "ticker": "SBER", "name": "Sberbank", "lot": 10, "currency": "rub"}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let position = client.get_open_position("acc", FIGI).await.unwrap().unwrap();

        // 15 pieces: one sellable lot, 5 pieces left over
        assert_eq!(position.balance, 1);
    }

    #[tokio::test]
    async fn test_http_error_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", path("SandboxService", "GetSandboxOrders").as_str())
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client.get_active_order("acc", FIGI).await;
        match result {
            Err(Error::Network { operation, source }) => {
                assert_eq!(operation, "get_active_order");
                assert!(source.to_string().contains("500"));
            }
            other => panic!("expected network error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_list_accounts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", path("SandboxService", "GetSandboxAccounts").as_str())
            .with_status(200)
            .with_body(
                r#"{"accounts": [
                    {"id": "a-1", "name": "closed", "status": "ACCOUNT_STATUS_CLOSED"},
                    {"id": "a-2", "name": "main", "status": "ACCOUNT_STATUS_OPEN"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let accounts = client.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].status, AccountStatus::Open);
    }
}
