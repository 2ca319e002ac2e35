use crate::analyzer::{BandAnalyzer, DEFAULT_MARGIN_RATIO, DEFAULT_WINDOW};
use crate::error::Error;
use crate::models::CandleInterval;
use crate::Result;
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://sandbox-invest-public-api.tinkoff.ru/rest";
const ENV_PREFIX: &str = "BANDBOT";

/// Application settings
///
/// Sources, lowest priority first: built-in defaults, the TOML file,
/// `BANDBOT__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub account: AccountConfig,
    pub trade: TradeConfig,
    pub instruments: InstrumentTable,
    pub run_timeout_secs: u64,
    pub report_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            account: AccountConfig::default(),
            trade: TradeConfig::default(),
            instruments: InstrumentTable::default(),
            run_timeout_secs: 300,
            report_path: PathBuf::from("report.json"),
        }
    }
}

impl AppConfig {
    /// Load settings
    ///
    /// # Arguments
    /// * `path` - Explicit config file (must exist). Without it `bandbot.toml`
    ///   in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name("bandbot").required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub base_url: String,
    pub token: String,
    pub request_timeout_secs: u64,
    pub requests_per_second: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            request_timeout_secs: 30,
            requests_per_second: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Fixed account; when empty an open sandbox account is found or created
    pub id: Option<String>,
    pub initial_deposit: i64,
    pub currency: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            id: None,
            initial_deposit: 3000,
            currency: "rub".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    pub strategy: String,
    pub ticker: String,
    pub operation_lots: i64,
    pub max_deal_sum: f64,
    pub deal_limit: f64,
    pub interval: CandleInterval,
    pub analysis_period_minutes: u64,
    pub deal_period_minutes: u64,
    pub simulate: bool,
    pub simulated_lot_multiplier: i64,
    pub min_profit: f64,
    pub poll_interval_secs: u64,
    pub band_window: usize,
    pub band_margin_ratio: f64,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            strategy: "band".to_string(),
            ticker: "SBER".to_string(),
            operation_lots: 10,
            max_deal_sum: 2000.0,
            deal_limit: 3000.0,
            interval: CandleInterval::FiveMinutes,
            analysis_period_minutes: 20,
            deal_period_minutes: 30,
            simulate: true,
            simulated_lot_multiplier: 10,
            min_profit: 10.0,
            poll_interval_secs: 10,
            band_window: DEFAULT_WINDOW,
            band_margin_ratio: DEFAULT_MARGIN_RATIO,
        }
    }
}

/// Ticker to figi lookup, injected at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct InstrumentTable(BTreeMap<String, String>);

impl InstrumentTable {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Figi for a ticker; tickers match case-insensitively
    pub fn resolve(&self, ticker: &str) -> Result<&str> {
        self.0
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(ticker))
            .map(|(_, figi)| figi.as_str())
            .ok_or_else(|| Error::UnknownInstrument(ticker.to_string()))
    }

    /// Ticker and figi pairs, sorted by ticker
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(t, f)| (t.as_str(), f.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for InstrumentTable {
    fn default() -> Self {
        Self::new(
            [
                ("SBER", "BBG004730N88"),
                ("SBERP", "BBG0047315Y7"),
                ("M", "BBG000C46HM9"),
                ("SAVE", "BBG000BF6RQ9"),
                ("MGNT", "BBG004RVFCY3"),
                ("DSKY", "BBG000BN56Q9"),
                ("MAGN", "BBG004S68507"),
                ("NLMK", "BBG004S681B4"),
                ("GMKN", "BBG004731489"),
            ]
            .into_iter()
            .map(|(t, f)| (t.to_string(), f.to_string())),
        )
    }
}

/// Parameters of one strategy run; fixed once the run starts
#[derive(Debug, Clone, PartialEq)]
pub struct TradeParams {
    pub account_id: String,
    pub figi: String,
    pub operation_lots: i64,
    pub max_deal_sum: f64, // Ceiling per deal
    pub deal_limit: f64,   // Ceiling over all deals
    pub interval: CandleInterval,
    pub analysis_period: Duration,
    pub deal_period: Duration,
    pub simulate: bool,
    pub simulated_lot_multiplier: i64,
    pub min_profit: f64, // Simulated orders below this profit are discarded
    pub poll_interval: Duration,
    pub analyzer: BandAnalyzer,
}

impl TradeParams {
    /// Parameters with default trade settings
    pub fn new(account_id: impl Into<String>, figi: impl Into<String>) -> Self {
        Self::from_config(&TradeConfig::default(), account_id, figi)
    }

    pub fn from_config(
        trade: &TradeConfig,
        account_id: impl Into<String>,
        figi: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            figi: figi.into(),
            operation_lots: trade.operation_lots,
            max_deal_sum: trade.max_deal_sum,
            deal_limit: trade.deal_limit,
            interval: trade.interval,
            analysis_period: Duration::from_secs(trade.analysis_period_minutes * 60),
            deal_period: Duration::from_secs(trade.deal_period_minutes * 60),
            simulate: trade.simulate,
            simulated_lot_multiplier: trade.simulated_lot_multiplier,
            min_profit: trade.min_profit,
            poll_interval: Duration::from_secs(trade.poll_interval_secs),
            analyzer: BandAnalyzer::new(trade.band_window, trade.band_margin_ratio),
        }
    }

    /// Reject inconsistent parameter combinations
    pub fn validate(&self) -> Result<()> {
        if self.account_id.is_empty() {
            return Err(Error::Config("account id is empty".to_string()));
        }
        self.validate_limits()
    }

    /// Every check except the account id, which may still be unresolved
    pub fn validate_limits(&self) -> Result<()> {
        if self.figi.is_empty() {
            return Err(Error::Config("instrument figi is empty".to_string()));
        }
        if self.max_deal_sum > self.deal_limit {
            return Err(Error::Config(format!(
                "deal limit {} should not be below max deal sum {}",
                self.deal_limit, self.max_deal_sum
            )));
        }
        if self.simulate && self.simulated_lot_multiplier <= 0 {
            return Err(Error::Config(format!(
                "simulated lot multiplier should be positive, got {}",
                self.simulated_lot_multiplier
            )));
        }
        if self.operation_lots < 1 {
            return Err(Error::Config(format!(
                "operation lots should be at least 1, got {}",
                self.operation_lots
            )));
        }
        if self.analysis_period < self.interval.duration() {
            return Err(Error::Config(format!(
                "analysis period {:?} is shorter than one {} candle",
                self.analysis_period, self.interval
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll interval should be positive".to_string()));
        }
        if self.analyzer.window == 0 {
            return Err(Error::Config("band window should be positive".to_string()));
        }
        if !(0.0..0.5).contains(&self.analyzer.margin_ratio) {
            return Err(Error::Config(format!(
                "band margin ratio should be in [0, 0.5), got {}",
                self.analyzer.margin_ratio
            )));
        }
        if !self.min_profit.is_finite() {
            return Err(Error::Config("minimum profit should be finite".to_string()));
        }
        Ok(())
    }

    /// Completed candles held by the simulation queue
    pub fn queue_len(&self) -> usize {
        let step = self.interval.duration().as_secs().max(1);
        (self.analysis_period.as_secs() / step) as usize
    }
}
