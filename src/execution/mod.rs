// Live order execution
pub mod executor;
pub mod sizing;

pub use executor::{
    BandExecutor, BuyOutcome, CycleState, FillOutcome, RunSummary, SellOutcome, StopReason,
};
pub use sizing::calc_lot_count;
