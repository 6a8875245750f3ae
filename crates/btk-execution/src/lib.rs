//! Order book, intraday path reconstruction, and order-matching engine
//! (spec §4.5, §4.6).

mod book;
mod engine;
mod path;

pub use book::OrderBook;
pub use engine::{CommissionConfig, ExecutionEngine, ExecutionReport};
pub use path::{generate_path, might_fill, PathConfig, PathProfile};
