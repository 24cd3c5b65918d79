//! Outcome engine
//!
//! For each (window, horizon) the forward candles strictly after `t_end`
//! are compared against the window's last close. Too few forward candles
//! yields a partial `Outcome`, never an error.

pub mod engine;
pub mod stats;

pub use engine::{
    aggregate_outcomes, compute_outcome, outcomes_for_window, AggregatedOutcome, Outcome,
    OutcomeConfig, OutcomeEngine,
};
pub use stats::percentile;
