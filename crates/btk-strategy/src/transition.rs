//! Strategy-level position signals and their mapping to orders (spec §4.7
//! steps 4–5).
//!
//! `PositionTransition` is a strategy-facing relative of `btk_portfolio`'s
//! raw `Transition` enum, not the same type: a strategy proposes intent
//! ("open this entry", "exit this position", "move this stop") — it does
//! not know a fill price or fill quantity yet, so it cannot construct an
//! `EntryFill`/`ExitFill`/`EntryComplete`/`ExitComplete` directly. Those are
//! applied later by the driver once the execution engine reports a trade.
//! `OpenEntry` and `TriggerExit` are the two variants that carry enough
//! information to emit an order (§4.7 step 5's bullet list); `AdjustRisk`
//! and `CancelEntry` only touch the positions map.

use btk_core::{Order, OrderKind, Price, Quantity, Side, StatusError, Symbol, Tif};
use btk_portfolio::{Position, RiskParams};
use chrono::NaiveDate;

/// How a generated order should be priced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderStyle {
    Market,
    Limit(Price),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PositionTransition {
    /// Start a new position: creates an `Entering` position and, via
    /// [`OrderGenerator::orders_for`], an opening order.
    OpenEntry {
        id: String,
        symbol: Symbol,
        side: Side,
        quantity: i64,
        entry_reason: String,
        order_style: OrderStyle,
        /// Risk params to attach once the entry completes — the driver
        /// carries these through to the `EntryComplete` transition it
        /// applies on fill (§4.3's `EntryComplete(avg_price, risk_params)`).
        risk_params: RiskParams,
    },
    /// Abandon an `Entering` position that has not yet received any fill.
    CancelEntry { id: String, reason: String },
    /// Begin closing a `Holding` position.
    TriggerExit {
        id: String,
        quantity: i64,
        reason: String,
        order_style: OrderStyle,
    },
    /// Adjust a `Holding` position's stop/take-profit.
    AdjustRisk { id: String, risk_params: RiskParams },
}

impl PositionTransition {
    pub fn position_id(&self) -> &str {
        match self {
            PositionTransition::OpenEntry { id, .. }
            | PositionTransition::CancelEntry { id, .. }
            | PositionTransition::TriggerExit { id, .. }
            | PositionTransition::AdjustRisk { id, .. } => id,
        }
    }
}

/// Maps `PositionTransition`s to concrete orders to submit (§4.7 step 5).
pub struct OrderGenerator;

impl OrderGenerator {
    /// `position` is the current state of the position named by
    /// `transition.position_id()`, as looked up by the caller in the
    /// positions map; `None` for `OpenEntry` (the position doesn't exist
    /// yet). Returns `Ok(None)` for transitions that emit no order.
    pub fn orders_for(
        transition: &PositionTransition,
        position: Option<&Position>,
        today: NaiveDate,
    ) -> Result<Option<Order>, StatusError> {
        match transition {
            PositionTransition::OpenEntry {
                id,
                symbol,
                side,
                quantity,
                order_style,
                ..
            } => {
                let qty = Quantity::new(*quantity).ok_or_else(|| {
                    StatusError::invalid_argument(format!(
                        "OpenEntry for position '{id}' has non-positive quantity {quantity}"
                    ))
                })?;
                let kind = match order_style {
                    OrderStyle::Market => OrderKind::Market,
                    OrderStyle::Limit(p) => OrderKind::Limit(*p),
                };
                let order = Order::new(format!("{id}-entry"), symbol.clone(), *side, kind, qty, Tif::Day, today)?;
                Ok(Some(order))
            }

            PositionTransition::TriggerExit {
                id,
                quantity,
                order_style,
                ..
            } => {
                let holding = match position {
                    Some(Position::Holding(h)) => h,
                    _ => {
                        return Err(StatusError::failed_precondition(format!(
                            "TriggerExit for position '{id}' requires a Holding position"
                        )))
                    }
                };
                let qty = Quantity::new(*quantity).ok_or_else(|| {
                    StatusError::invalid_argument(format!(
                        "TriggerExit for position '{id}' has non-positive quantity {quantity}"
                    ))
                })?;
                let closing_side = match holding.side {
                    Side::Buy => Side::Sell,
                    Side::Sell => Side::Buy,
                };
                let kind = match order_style {
                    OrderStyle::Market => OrderKind::Market,
                    OrderStyle::Limit(p) => OrderKind::Limit(*p),
                };
                let order = Order::new(
                    format!("{id}-exit"),
                    holding.symbol.clone(),
                    closing_side,
                    kind,
                    qty,
                    Tif::Day,
                    today,
                )?;
                Ok(Some(order))
            }

            PositionTransition::CancelEntry { .. } | PositionTransition::AdjustRisk { .. } => Ok(None),
        }
    }
}
