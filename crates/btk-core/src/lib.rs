//! Core value types shared across the backtesting workspace: prices,
//! quantities, symbols, bars, orders, trades, and the status-error
//! taxonomy. No crate in the workspace depends on anything below this one.

mod market;
mod order;
mod price;
mod status;
mod trade;

pub use market::{OhlcBar, Symbol};
pub use order::{Order, OrderKind, OrderStatus, Side, Tif};
pub use price::{Price, PriceError, Quantity, MICROS_PER_UNIT};
pub use status::{StatusCode, StatusError};
pub use trade::Trade;
