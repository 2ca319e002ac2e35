use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Tradeable instrument as described by the broker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub figi: String,
    pub ticker: String,
    pub name: String,
    pub lot: i64, // Pieces per lot
    pub currency: String,
}

/// OHLCV candlestick for one sampling bucket
///
/// An incomplete candle is the bucket still being traded; it never feeds the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub is_complete: bool,
}

impl Candle {
    /// True when `price` lies within the candle's traded range
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

/// Candle sampling interval
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "1d")]
    Day,
}

impl CandleInterval {
    pub fn duration(&self) -> Duration {
        match self {
            CandleInterval::OneMinute => Duration::from_secs(60),
            CandleInterval::FiveMinutes => Duration::from_secs(5 * 60),
            CandleInterval::FifteenMinutes => Duration::from_secs(15 * 60),
            CandleInterval::Hour => Duration::from_secs(60 * 60),
            CandleInterval::Day => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Name used on the broker wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "CANDLE_INTERVAL_1_MIN",
            CandleInterval::FiveMinutes => "CANDLE_INTERVAL_5_MIN",
            CandleInterval::FifteenMinutes => "CANDLE_INTERVAL_15_MIN",
            CandleInterval::Hour => "CANDLE_INTERVAL_HOUR",
            CandleInterval::Day => "CANDLE_INTERVAL_DAY",
        }
    }
}

impl FromStr for CandleInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(CandleInterval::OneMinute),
            "5m" => Ok(CandleInterval::FiveMinutes),
            "15m" => Ok(CandleInterval::FifteenMinutes),
            "1h" => Ok(CandleInterval::Hour),
            "1d" => Ok(CandleInterval::Day),
            other => Err(format!("unknown candle interval '{}'", other)),
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandleInterval::OneMinute => "1m",
            CandleInterval::FiveMinutes => "5m",
            CandleInterval::FifteenMinutes => "15m",
            CandleInterval::Hour => "1h",
            CandleInterval::Day => "1d",
        };
        f.write_str(s)
    }
}

/// Recommended limit prices: buy low, sell high
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceBand {
    pub buy_price: f64,
    pub sell_price: f64,
}

impl PriceBand {
    pub fn spread(&self) -> f64 {
        self.sell_price - self.buy_price
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

/// Execution status of an order as reported by the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    /// Rejected and cancelled orders will never fill
    pub fn is_failed(&self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Filled => "filled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Limit order to submit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub account_id: String,
    pub figi: String,
    pub side: OrderSide,
    pub limit_price: f64,
    pub quantity: i64, // In lots
}

/// Order known to the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub account_id: String,
    pub figi: String,
    pub side: OrderSide,
    pub limit_price: f64,
    pub quantity: i64,
    pub status: OrderStatus,
}

/// Open position in one instrument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub figi: String,
    pub balance: i64, // In lots
    pub exchange_blocked: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccountStatus {
    New,
    Open,
    Closed,
}

/// Brokerage account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub status: AccountStatus,
}

/// Executed account operation (trade, fee, pay-in)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub figi: String,
    pub kind: String,
    pub quantity: i64,
    pub payment: f64,
    pub date: DateTime<Utc>,
}
