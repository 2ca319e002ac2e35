// Trading strategies and their registry
pub mod price_band;

pub use price_band::PriceBandStrategy;

use crate::api::Collaborators;
use crate::backtest::Report;
use crate::config::TradeParams;
use crate::error::Error;
use crate::execution::RunSummary;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Base trait for all trading strategies
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Get strategy name
    fn name(&self) -> &str;

    /// Run with fixed parameters until done, cancelled or failed
    ///
    /// Simulation output lands in `report`; it is only written once the
    /// replay has finished.
    async fn run(
        &self,
        cancel: &CancellationToken,
        params: &TradeParams,
        report: &mut Report,
    ) -> Result<RunSummary>;
}

pub type StrategyFactory = fn(Collaborators) -> Box<dyn Strategy>;

/// Strategy identifier to constructor lookup
#[derive(Default)]
pub struct StrategyRegistry {
    factories: HashMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in strategies
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("band", PriceBandStrategy::boxed);
        registry
    }

    /// Add or replace a strategy under `id`
    pub fn register(&mut self, id: impl Into<String>, factory: StrategyFactory) {
        self.factories.insert(id.into(), factory);
    }

    pub fn create(&self, id: &str, collaborators: Collaborators) -> Result<Box<dyn Strategy>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| Error::UnknownStrategy(id.to_string()))?;
        Ok(factory(collaborators))
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PaperBroker;
    use crate::execution::StopReason;
    use std::sync::Arc;

    struct IdleStrategy;

    #[async_trait]
    impl Strategy for IdleStrategy {
        fn name(&self) -> &str {
            "Idle"
        }

        async fn run(
            &self,
            _cancel: &CancellationToken,
            _params: &TradeParams,
            _report: &mut Report,
        ) -> Result<RunSummary> {
            Ok(RunSummary {
                cycles_completed: 0,
                stop_reason: StopReason::Cancelled,
            })
        }
    }

    fn idle(_: Collaborators) -> Box<dyn Strategy> {
        Box::new(IdleStrategy)
    }

    fn collaborators() -> Collaborators {
        Collaborators::from_broker(Arc::new(PaperBroker::new()))
    }

    #[test]
    fn test_defaults_include_band() {
        let registry = StrategyRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["band"]);

        let strategy = registry.create("band", collaborators()).unwrap();
        assert_eq!(strategy.name(), "PriceBand");
    }

    #[test]
    fn test_unknown_strategy() {
        let registry = StrategyRegistry::with_defaults();
        let result = registry.create("grid", collaborators());
        assert!(matches!(result, Err(Error::UnknownStrategy(ref name)) if name == "grid"));
    }

    #[test]
    fn test_register_without_touching_dispatch() {
        let mut registry = StrategyRegistry::with_defaults();
        registry.register("idle", idle);
        assert_eq!(registry.names(), vec!["band", "idle"]);

        let strategy = registry.create("idle", collaborators()).unwrap();
        let mut report = Report::new();
        let summary = tokio_test::block_on(strategy.run(
            &CancellationToken::new(),
            &TradeParams::new("acc", "figi"),
            &mut report,
        ))
        .unwrap();
        assert_eq!(summary.cycles_completed, 0);
    }
}
