use super::Strategy;
use crate::api::Collaborators;
use crate::backtest::{Report, SimulationRunner};
use crate::config::TradeParams;
use crate::execution::{BandExecutor, RunSummary, StopReason};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// Buy near the recent lows, sell near the recent highs
///
/// In simulation mode the prior day is replayed once and the report filled;
/// otherwise the live executor trades until cancelled.
pub struct PriceBandStrategy {
    collaborators: Collaborators,
}

impl PriceBandStrategy {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    pub fn boxed(collaborators: Collaborators) -> Box<dyn Strategy> {
        Box::new(Self::new(collaborators))
    }
}

#[async_trait]
impl Strategy for PriceBandStrategy {
    fn name(&self) -> &str {
        "PriceBand"
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        params: &TradeParams,
        report: &mut Report,
    ) -> Result<RunSummary> {
        params.validate()?;

        let instrument = self
            .collaborators
            .market
            .get_instrument(&params.figi)
            .await?;

        tracing::info!(
            strategy = self.name(),
            figi = %instrument.figi,
            ticker = %instrument.ticker,
            lot = instrument.lot,
            simulate = params.simulate,
            deal_period = ?params.deal_period,
            "Run strategy"
        );

        if params.simulate {
            let runner = SimulationRunner::new(params.clone());
            let replayed = runner
                .simulate(self.collaborators.market.as_ref(), &instrument, Utc::now())
                .await?;
            *report = replayed;

            return Ok(RunSummary {
                cycles_completed: 1,
                stop_reason: StopReason::SimulationFinished,
            });
        }

        let mut executor = BandExecutor::new(
            self.collaborators.market.clone(),
            self.collaborators.gateway.clone(),
        );
        executor.run(cancel, params).await
    }
}
