//! Position lifecycle state machine and lot-tracked accounting ledger
//! (spec §4.3, §4.4).

mod ledger;
mod position;

pub use ledger::{AccountingMethod, Lot, Portfolio};
pub use position::{
    apply_transition, ClosedPosition, EnteringPosition, ExitingPosition, HoldingPosition,
    Position, RiskParams, Transition, TransitionError,
};
