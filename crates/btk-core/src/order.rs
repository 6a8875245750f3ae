//! Order, order kind, time-in-force, and order status (spec §3).

use chrono::NaiveDate;

use crate::market::Symbol;
use crate::price::{Price, Quantity};
use crate::status::StatusError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

/// The four order kinds from spec §3. `StopLimit`'s ordering invariant
/// (Buy: stop <= limit; Sell: stop >= limit) is enforced in
/// [`OrderKind::validate`], called from [`Order::new`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit(Price),
    Stop(Price),
    StopLimit { stop: Price, limit: Price },
}

impl OrderKind {
    fn validate(&self, side: Side) -> Result<(), StatusError> {
        if let OrderKind::StopLimit { stop, limit } = self {
            let ok = match side {
                Side::Buy => stop.micros() <= limit.micros(),
                Side::Sell => stop.micros() >= limit.micros(),
            };
            if !ok {
                return Err(StatusError::invalid_argument(format!(
                    "StopLimit order invariant violated for {side:?}: stop={stop} limit={limit}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tif {
    Day,
    Gtc,
    Ioc,
    Fok,
}

/// Order lifecycle status (spec §3). `Active` is a derived predicate, not a
/// stored variant — see [`OrderStatus::is_active`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    PartiallyFilled(Quantity),
    Filled,
    Cancelled,
    Rejected(String),
}

impl OrderStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PartiallyFilled(_))
    }
}

/// A resting or completed order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Quantity,
    pub time_in_force: Tif,
    pub status: OrderStatus,
    pub filled_qty: i64,
    pub avg_fill_price: Option<Price>,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        symbol: Symbol,
        side: Side,
        kind: OrderKind,
        quantity: Quantity,
        time_in_force: Tif,
        created_at: NaiveDate,
    ) -> Result<Self, StatusError> {
        kind.validate(side)?;
        Ok(Self {
            id: id.into(),
            symbol,
            side,
            kind,
            quantity,
            time_in_force,
            status: OrderStatus::Pending,
            filled_qty: 0,
            avg_fill_price: None,
            created_at,
            updated_at: created_at,
        })
    }

    pub fn remaining_qty(&self) -> i64 {
        self.quantity.get() - self.filled_qty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(v: f64) -> Price {
        Price::from_f64(v).unwrap()
    }

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    #[test]
    fn stop_limit_buy_requires_stop_le_limit() {
        let ok = Order::new(
            "o1",
            "AAPL".into(),
            Side::Buy,
            OrderKind::StopLimit {
                stop: px(100.0),
                limit: px(101.0),
            },
            Quantity::new(10).unwrap(),
            Tif::Day,
            d(),
        );
        assert!(ok.is_ok());

        let bad = Order::new(
            "o2",
            "AAPL".into(),
            Side::Buy,
            OrderKind::StopLimit {
                stop: px(102.0),
                limit: px(101.0),
            },
            Quantity::new(10).unwrap(),
            Tif::Day,
            d(),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn stop_limit_sell_requires_stop_ge_limit() {
        let ok = Order::new(
            "o1",
            "AAPL".into(),
            Side::Sell,
            OrderKind::StopLimit {
                stop: px(99.0),
                limit: px(100.0),
            },
            Quantity::new(10).unwrap(),
            Tif::Day,
            d(),
        );
        assert!(ok.is_err());

        let ok2 = Order::new(
            "o1",
            "AAPL".into(),
            Side::Sell,
            OrderKind::StopLimit {
                stop: px(100.0),
                limit: px(99.0),
            },
            Quantity::new(10).unwrap(),
            Tif::Day,
            d(),
        );
        assert!(ok2.is_ok());
    }

    #[test]
    fn remaining_qty_tracks_fills() {
        let mut o = Order::new(
            "o1",
            "AAPL".into(),
            Side::Buy,
            OrderKind::Market,
            Quantity::new(10).unwrap(),
            Tif::Day,
            d(),
        )
        .unwrap();
        o.filled_qty = 4;
        assert_eq!(o.remaining_qty(), 6);
    }

    #[test]
    fn active_statuses() {
        assert!(OrderStatus::Pending.is_active());
        assert!(OrderStatus::PartiallyFilled(Quantity::new(1).unwrap()).is_active());
        assert!(!OrderStatus::Filled.is_active());
        assert!(!OrderStatus::Cancelled.is_active());
        assert!(!OrderStatus::Rejected("x".into()).is_active());
    }
}
