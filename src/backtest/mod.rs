// Day replay of the band strategy without real orders
pub mod report;
pub mod runner;
pub mod synthetic;

pub use report::{Report, SimulationSummary, TickRecord};
pub use runner::{prior_day_window, SimulatedOrder, SimulationRunner};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
