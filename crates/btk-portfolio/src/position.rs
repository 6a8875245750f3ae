//! Position lifecycle state machine (spec §4.3): `Entering -> Holding ->
//! Exiting -> Closed`. `apply_transition` is pure and total — it returns a
//! new [`Position`] or a [`TransitionError`]; it never partially mutates its
//! input, mirroring `OmsOrder::apply`'s match-on-`(state, event)` shape.

use chrono::NaiveDate;

use btk_core::{Price, Side, Symbol};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskParams {
    pub stop_price: Option<Price>,
    pub take_profit_price: Option<Price>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnteringPosition {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub entry_reason: String,
    pub target_qty: i64,
    pub filled_qty: i64,
    pub last_updated: NaiveDate,
}

impl EnteringPosition {
    pub fn remaining_qty(&self) -> i64 {
        self.target_qty - self.filled_qty
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HoldingPosition {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Price,
    pub entry_date: NaiveDate,
    pub quantity: i64,
    pub risk_params: RiskParams,
    pub last_updated: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitingPosition {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Price,
    pub entry_date: NaiveDate,
    pub quantity: i64,
    pub exit_reason: String,
    pub target_qty: i64,
    pub filled_qty: i64,
    pub last_updated: NaiveDate,
}

impl ExitingPosition {
    pub fn remaining_qty(&self) -> i64 {
        self.target_qty - self.filled_qty
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClosedPosition {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Option<Price>,
    pub entry_date: Option<NaiveDate>,
    pub exit_price: Option<Price>,
    pub exit_date: Option<NaiveDate>,
    pub quantity: i64,
    /// P&L before commission accounting (the portfolio ledger, not this
    /// position, is authoritative for commission-inclusive realized P&L —
    /// see `btk-portfolio::ledger`).
    pub gross_pnl_micros: i64,
    pub net_pnl_micros: i64,
    pub return_percent: f64,
    pub days_held: i64,
    pub close_reason: String,
    pub last_updated: NaiveDate,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Position {
    Entering(EnteringPosition),
    Holding(HoldingPosition),
    Exiting(ExitingPosition),
    Closed(ClosedPosition),
}

impl Position {
    pub fn last_updated(&self) -> NaiveDate {
        match self {
            Position::Entering(p) => p.last_updated,
            Position::Holding(p) => p.last_updated,
            Position::Exiting(p) => p.last_updated,
            Position::Closed(p) => p.last_updated,
        }
    }

    pub fn new_entering(
        id: impl Into<String>,
        symbol: Symbol,
        side: Side,
        entry_reason: impl Into<String>,
        target_qty: i64,
        date: NaiveDate,
    ) -> Self {
        Position::Entering(EnteringPosition {
            id: id.into(),
            symbol,
            side,
            entry_reason: entry_reason.into(),
            target_qty,
            filled_qty: 0,
            last_updated: date,
        })
    }
}

/// One lifecycle event from spec §4.3's transition table.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    EntryFill { qty: i64, date: NaiveDate },
    EntryComplete {
        avg_price: Price,
        risk_params: RiskParams,
        date: NaiveDate,
    },
    CancelEntry { reason: String, date: NaiveDate },
    TriggerExit {
        reason: String,
        target_qty: i64,
        date: NaiveDate,
    },
    UpdateRiskParams { new: RiskParams, date: NaiveDate },
    ExitFill { qty: i64, date: NaiveDate },
    ExitComplete { avg_exit_price: Price, date: NaiveDate },
}

/// Returned when a [`Transition`] cannot legally be applied in the current
/// state, or when it is legal but violates one of its preconditions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionError {
    pub from: &'static str,
    pub message: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal position transition from {}: {}", self.from, self.message)
    }
}

impl std::error::Error for TransitionError {}

fn err(from: &'static str, message: impl Into<String>) -> TransitionError {
    TransitionError {
        from,
        message: message.into(),
    }
}

fn risk_params_valid(side: Side, entry_price: Price, risk: &RiskParams) -> bool {
    let stop_ok = risk.stop_price.map_or(true, |s| match side {
        Side::Buy => s < entry_price,
        Side::Sell => s > entry_price,
    });
    let tp_ok = risk.take_profit_price.map_or(true, |t| match side {
        Side::Buy => t > entry_price,
        Side::Sell => t < entry_price,
    });
    stop_ok && tp_ok
}

/// Applies `transition` to `position`. Pure and total: on success returns a
/// new `Position` whose `last_updated` is `>=` the input's; on failure
/// returns `position` unmodified alongside a [`TransitionError`].
pub fn apply_transition(position: Position, transition: Transition) -> Result<Position, (Position, TransitionError)> {
    match (position, transition) {
        (Position::Entering(mut p), Transition::EntryFill { qty, date }) => {
            if date < p.last_updated {
                let msg = "EntryFill date precedes last_updated".to_string();
                return Err((Position::Entering(p.clone()), err("Entering", msg)));
            }
            if p.filled_qty + qty > p.target_qty {
                let msg = format!(
                    "EntryFill({qty}) would exceed target_qty {} (already filled {})",
                    p.target_qty, p.filled_qty
                );
                let from = p.clone();
                return Err((Position::Entering(from), err("Entering", msg)));
            }
            p.filled_qty += qty;
            p.last_updated = date;
            Ok(Position::Entering(p))
        }

        (Position::Entering(p), Transition::EntryComplete { avg_price, risk_params, date }) => {
            if date < p.last_updated {
                let msg = "EntryComplete date precedes last_updated".to_string();
                return Err((Position::Entering(p.clone()), err("Entering", msg)));
            }
            if p.filled_qty != p.target_qty {
                let msg = format!(
                    "EntryComplete requires filled_qty == target_qty ({} != {})",
                    p.filled_qty, p.target_qty
                );
                return Err((Position::Entering(p.clone()), err("Entering", msg)));
            }
            if !risk_params_valid(p.side, avg_price, &risk_params) {
                let msg = "risk params inconsistent with entry price/side".to_string();
                return Err((Position::Entering(p.clone()), err("Entering", msg)));
            }
            Ok(Position::Holding(HoldingPosition {
                id: p.id,
                symbol: p.symbol,
                side: p.side,
                entry_price: avg_price,
                entry_date: date,
                quantity: p.target_qty,
                risk_params,
                last_updated: date,
            }))
        }

        (Position::Entering(p), Transition::CancelEntry { reason, date }) => {
            if date < p.last_updated {
                let msg = "CancelEntry date precedes last_updated".to_string();
                return Err((Position::Entering(p.clone()), err("Entering", msg)));
            }
            if p.filled_qty != 0 {
                let msg = format!("CancelEntry requires filled_qty == 0, got {}", p.filled_qty);
                return Err((Position::Entering(p.clone()), err("Entering", msg)));
            }
            Ok(Position::Closed(ClosedPosition {
                id: p.id,
                symbol: p.symbol,
                side: p.side,
                entry_price: None,
                entry_date: None,
                exit_price: None,
                exit_date: None,
                quantity: 0,
                gross_pnl_micros: 0,
                net_pnl_micros: 0,
                return_percent: 0.0,
                days_held: 0,
                close_reason: reason,
                last_updated: date,
            }))
        }

        (Position::Holding(p), Transition::TriggerExit { reason, target_qty, date }) => {
            if date < p.last_updated {
                let msg = "TriggerExit date precedes last_updated".to_string();
                return Err((Position::Holding(p.clone()), err("Holding", msg)));
            }
            Ok(Position::Exiting(ExitingPosition {
                id: p.id,
                symbol: p.symbol,
                side: p.side,
                entry_price: p.entry_price,
                entry_date: p.entry_date,
                quantity: p.quantity,
                exit_reason: reason,
                target_qty,
                filled_qty: 0,
                last_updated: date,
            }))
        }

        (Position::Holding(mut p), Transition::UpdateRiskParams { new, date }) => {
            if date < p.last_updated {
                let msg = "UpdateRiskParams date precedes last_updated".to_string();
                return Err((Position::Holding(p.clone()), err("Holding", msg)));
            }
            if !risk_params_valid(p.side, p.entry_price, &new) {
                let msg = "risk params inconsistent with entry price/side".to_string();
                return Err((Position::Holding(p.clone()), err("Holding", msg)));
            }
            p.risk_params = new;
            p.last_updated = date;
            Ok(Position::Holding(p))
        }

        (Position::Exiting(mut p), Transition::ExitFill { qty, date }) => {
            if date < p.last_updated {
                let msg = "ExitFill date precedes last_updated".to_string();
                return Err((Position::Exiting(p.clone()), err("Exiting", msg)));
            }
            if p.filled_qty + qty > p.target_qty {
                let msg = format!(
                    "ExitFill({qty}) would exceed target_qty {} (already filled {})",
                    p.target_qty, p.filled_qty
                );
                return Err((Position::Exiting(p.clone()), err("Exiting", msg)));
            }
            p.filled_qty += qty;
            p.last_updated = date;
            Ok(Position::Exiting(p))
        }

        (Position::Exiting(p), Transition::ExitComplete { avg_exit_price, date }) => {
            if date < p.last_updated {
                let msg = "ExitComplete date precedes last_updated".to_string();
                return Err((Position::Exiting(p.clone()), err("Exiting", msg)));
            }
            if p.filled_qty != p.target_qty {
                let msg = format!(
                    "ExitComplete requires filled_qty == target_qty ({} != {})",
                    p.filled_qty, p.target_qty
                );
                return Err((Position::Exiting(p.clone()), err("Exiting", msg)));
            }
            let dir = match p.side {
                Side::Buy => 1,
                Side::Sell => -1,
            };
            let gross = (avg_exit_price.micros() - p.entry_price.micros()) * p.quantity * dir;
            let days_held = (date - p.entry_date).num_days();
            let cost_basis = p.entry_price.micros() as f64 * p.quantity as f64;
            let return_percent = if cost_basis != 0.0 {
                gross as f64 / cost_basis * 100.0
            } else {
                0.0
            };
            Ok(Position::Closed(ClosedPosition {
                id: p.id,
                symbol: p.symbol,
                side: p.side,
                entry_price: Some(p.entry_price),
                entry_date: Some(p.entry_date),
                exit_price: Some(avg_exit_price),
                exit_date: Some(date),
                quantity: p.quantity,
                gross_pnl_micros: gross,
                net_pnl_micros: gross,
                return_percent,
                days_held,
                close_reason: p.exit_reason,
                last_updated: date,
            }))
        }

        (other, transition) => {
            let from = match &other {
                Position::Entering(_) => "Entering",
                Position::Holding(_) => "Holding",
                Position::Exiting(_) => "Exiting",
                Position::Closed(_) => "Closed",
            };
            let msg = format!("{transition:?} is not legal from {from}");
            Err((other, err(from, msg)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn px(v: f64) -> Price {
        Price::from_f64(v).unwrap()
    }

    fn entering(target: i64) -> Position {
        Position::new_entering("p1", "AAPL".into(), Side::Buy, "signal", target, d(1))
    }

    #[test]
    fn entry_fill_then_complete_transitions_to_holding() {
        let p = entering(10);
        let p = apply_transition(
            p,
            Transition::EntryFill { qty: 10, date: d(2) },
        )
        .unwrap();
        let p = apply_transition(
            p,
            Transition::EntryComplete {
                avg_price: px(100.0),
                risk_params: RiskParams {
                    stop_price: Some(px(95.0)),
                    take_profit_price: Some(px(110.0)),
                },
                date: d(2),
            },
        )
        .unwrap();
        match p {
            Position::Holding(h) => {
                assert_eq!(h.quantity, 10);
                assert_eq!(h.entry_price, px(100.0));
            }
            _ => panic!("expected Holding"),
        }
    }

    #[test]
    fn entry_fill_over_target_is_rejected() {
        let p = entering(10);
        let (unchanged, e) = apply_transition(p, Transition::EntryFill { qty: 11, date: d(2) }).unwrap_err();
        assert!(matches!(unchanged, Position::Entering(_)));
        assert_eq!(e.from, "Entering");
    }

    #[test]
    fn entry_complete_before_fully_filled_is_rejected() {
        let p = entering(10);
        let p = apply_transition(p, Transition::EntryFill { qty: 5, date: d(2) }).unwrap();
        let (unchanged, _) = apply_transition(
            p,
            Transition::EntryComplete {
                avg_price: px(100.0),
                risk_params: RiskParams {
                    stop_price: None,
                    take_profit_price: None,
                },
                date: d(2),
            },
        )
        .unwrap_err();
        assert!(matches!(unchanged, Position::Entering(_)));
    }

    #[test]
    fn cancel_entry_requires_zero_fill() {
        let p = entering(10);
        let closed = apply_transition(p, Transition::CancelEntry { reason: "no signal".into(), date: d(1) }).unwrap();
        assert!(matches!(closed, Position::Closed(_)));

        let p2 = entering(10);
        let p2 = apply_transition(p2, Transition::EntryFill { qty: 1, date: d(2) }).unwrap();
        let (unchanged, _) =
            apply_transition(p2, Transition::CancelEntry { reason: "x".into(), date: d(3) }).unwrap_err();
        assert!(matches!(unchanged, Position::Entering(_)));
    }

    fn holding() -> Position {
        Position::Holding(HoldingPosition {
            id: "p1".into(),
            symbol: "AAPL".into(),
            side: Side::Buy,
            entry_price: px(150.0),
            entry_date: d(3),
            quantity: 10,
            risk_params: RiskParams {
                stop_price: Some(px(142.5)),
                take_profit_price: Some(px(165.0)),
            },
            last_updated: d(3),
        })
    }

    #[test]
    fn trigger_exit_then_exit_fill_then_complete_closes_with_pnl() {
        let p = holding();
        let p = apply_transition(
            p,
            Transition::TriggerExit {
                reason: "take profit".into(),
                target_qty: 10,
                date: d(7),
            },
        )
        .unwrap();
        let p = apply_transition(p, Transition::ExitFill { qty: 10, date: d(8) }).unwrap();
        let p = apply_transition(p, Transition::ExitComplete { avg_exit_price: px(165.3), date: d(8) }).unwrap();
        match p {
            Position::Closed(c) => {
                assert_eq!(c.gross_pnl_micros, 10 * (165_300_000 - 150_000_000));
                assert_eq!(c.days_held, 5);
                assert_eq!(c.close_reason, "take profit");
            }
            _ => panic!("expected Closed"),
        }
    }

    #[test]
    fn update_risk_params_rejects_stop_above_entry_on_long() {
        let p = holding();
        let (unchanged, _) = apply_transition(
            p,
            Transition::UpdateRiskParams {
                new: RiskParams {
                    stop_price: Some(px(160.0)), // >= entry 150 on a long: illegal
                    take_profit_price: Some(px(165.0)),
                },
                date: d(4),
            },
        )
        .unwrap_err();
        assert!(matches!(unchanged, Position::Holding(_)));
    }

    #[test]
    fn illegal_transition_returns_input_unmodified() {
        let p = entering(10);
        let original = p.clone();
        let (unchanged, _) = apply_transition(p, Transition::ExitFill { qty: 1, date: d(2) }).unwrap_err();
        assert_eq!(unchanged, original);
    }
}
