//! Strategy capability context (spec §4.7 step 4, §6 "Strategy capability").
//!
//! `get_price`/`get_indicator` are supplied as `FnMut` closures rather than
//! a trait object the strategy calls directly, so the driver can capture its
//! own mutable indicator cache and price archive behind them — the strategy
//! only ever sees the narrow capability surface spec.md grants it, never the
//! cache or archive themselves.

use std::collections::HashMap;

use btk_core::{OhlcBar, Symbol};
use btk_indicators::IndicatorKind;
use btk_marketdata::Cadence;
use btk_portfolio::Position;
use chrono::NaiveDate;

pub struct StrategyContext<'a> {
    pub date: NaiveDate,
    pub positions: &'a HashMap<String, Position>,
    get_price: Box<dyn FnMut(&Symbol) -> Option<OhlcBar> + 'a>,
    get_indicator: Box<dyn FnMut(&Symbol, IndicatorKind, usize, Cadence) -> Option<f64> + 'a>,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        date: NaiveDate,
        positions: &'a HashMap<String, Position>,
        get_price: impl FnMut(&Symbol) -> Option<OhlcBar> + 'a,
        get_indicator: impl FnMut(&Symbol, IndicatorKind, usize, Cadence) -> Option<f64> + 'a,
    ) -> Self {
        Self {
            date,
            positions,
            get_price: Box::new(get_price),
            get_indicator: Box::new(get_indicator),
        }
    }

    /// Today's OHLC bar for `symbol`, or `None` if it has no bar today.
    pub fn get_price(&mut self, symbol: &Symbol) -> Option<OhlcBar> {
        (self.get_price)(symbol)
    }

    /// The indicator value as of today (or the most recent cached period),
    /// or `None` on insufficient history.
    pub fn get_indicator(
        &mut self,
        symbol: &Symbol,
        kind: IndicatorKind,
        period: usize,
        cadence: Cadence,
    ) -> Option<f64> {
        (self.get_indicator)(symbol, kind, period, cadence)
    }
}
