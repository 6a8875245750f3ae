//! Simulation driver, run configuration, and metric accumulators (spec
//! §4.7, §4.8).

mod config;
mod driver;
mod metrics;

pub use config::BacktestConfig;
pub use driver::{CancellationToken, SimulationDriver, BacktestReport, StepResult};
pub use metrics::{MaxDrawdown, MetricAccumulator, SharpeRatio, SummaryMetrics};
