//! The strategy trait (spec §4.7 step 4), grounded on the teacher's
//! two-method `Strategy` trait (`spec`/`on_bar`), generalized: a single
//! strategy is invoked directly by the driver, with none of the teacher's
//! `StrategyHost` shadow-mode/multi-strategy-rejection policy layered on
//! top, since spec.md doesn't call for either.

use crate::context::StrategyContext;
use crate::transition::PositionTransition;

pub trait Strategy {
    fn name(&self) -> &str;

    /// Evaluates one day's close. Must be referentially transparent given
    /// `ctx`'s inputs (§6's "Strategy capability" contract) and must not
    /// mutate anything outside of `ctx`'s capability closures.
    fn on_market_close(&mut self, ctx: &mut StrategyContext) -> Vec<PositionTransition>;
}
