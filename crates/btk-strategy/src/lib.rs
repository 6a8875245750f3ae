//! The strategy capability surface: the `Strategy` trait, its context, and
//! the mapping from strategy-level position signals to concrete orders
//! (spec §4.7 steps 4–5, §6, §9).

mod context;
mod strategy;
mod transition;

pub use context::StrategyContext;
pub use strategy::Strategy;
pub use transition::{OrderGenerator, OrderStyle, PositionTransition};
