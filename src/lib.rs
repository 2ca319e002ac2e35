// Core modules
pub mod account;
pub mod analyzer;
pub mod api;
pub mod backtest;
pub mod config;
pub mod error;
pub mod execution;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use analyzer::BandAnalyzer;
pub use config::{AppConfig, TradeParams};
pub use error::Error;
pub use models::*;
pub use strategy::{Strategy, StrategyRegistry};

// Error handling
pub type Result<T> = std::result::Result<T, Error>;
