use crate::models::OrderStatus;

/// Errors produced by the trading engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid parameter combination; raised before any network call
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no completed candles to analyze")]
    EmptyInput,

    #[error("available lot count {lots} is less than 1")]
    InsufficientQuantity { lots: i64 },

    #[error("order {order_id} finished with status {status}")]
    OrderRejected { order_id: String, status: OrderStatus },

    #[error("position in {figi} is blocked by the exchange")]
    PositionBlocked { figi: String },

    /// Any collaborator call failure, wrapped with the operation that failed
    #[error("{operation} failed: {source}")]
    Network {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),

    #[error("failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn network(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Error::Network {
            operation,
            source: source.into(),
        }
    }
}
