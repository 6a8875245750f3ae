//! Executed trade records (spec §3). Immutable once recorded.

use chrono::NaiveDate;

use crate::market::Symbol;
use crate::order::Side;
use crate::price::{Price, Quantity};

/// One execution against an order. `realized_pnl` is `None` for trades that
/// open or add to a position and `Some(_)` for trades that close or reduce
/// one — the portfolio ledger fills this in, not the execution engine.
/// Stored as signed integer micros rather than `Price` because a realized
/// loss is negative, and `Price` is strictly positive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trade {
    pub id: String,
    pub order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
    pub commission: Price,
    pub timestamp: NaiveDate,
    pub realized_pnl: Option<i64>,
}

impl Trade {
    pub fn new(
        id: impl Into<String>,
        order_id: impl Into<String>,
        symbol: Symbol,
        side: Side,
        quantity: Quantity,
        price: Price,
        commission: Price,
        timestamp: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            order_id: order_id.into(),
            symbol,
            side,
            quantity,
            price,
            commission,
            timestamp,
            realized_pnl: None,
        }
    }

    pub fn gross_value(&self) -> i64 {
        self.price.micros() * self.quantity.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gross_value_multiplies_price_and_quantity() {
        let t = Trade::new(
            "t1",
            "o1",
            "AAPL".into(),
            Side::Buy,
            Quantity::new(10).unwrap(),
            Price::from_f64(100.0).unwrap(),
            Price::from_f64(1.0).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        );
        assert_eq!(t.gross_value(), 100_000_000 * 10);
        assert!(t.realized_pnl.is_none());
    }
}
