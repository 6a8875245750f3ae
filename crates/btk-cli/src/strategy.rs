//! A minimal EMA-cross demo strategy: enough to exercise the whole stack
//! end-to-end without inventing a strategy-library (out of scope, see
//! `SPEC_FULL.md`'s non-goals). Grounded on the teacher's
//! `BuyThenExitStrategy` shape in `mqk-cli::commands::bkt` — one strategy
//! struct holding its own parameters and per-symbol book-keeping, no
//! external signal framework.

use std::collections::HashMap;

use btk_core::{Side, Symbol};
use btk_indicators::IndicatorKind;
use btk_marketdata::Cadence;
use btk_portfolio::{Position, RiskParams};
use btk_strategy::{OrderStyle, PositionTransition, Strategy, StrategyContext};

pub struct EmaCrossStrategy {
    symbols: Vec<Symbol>,
    ema_period: usize,
    quantity: i64,
    stop_pct: f64,
    take_profit_pct: f64,
    next_id: u64,
}

impl EmaCrossStrategy {
    pub fn new(symbols: Vec<Symbol>, ema_period: usize, quantity: i64, stop_pct: f64, take_profit_pct: f64) -> Self {
        Self {
            symbols,
            ema_period,
            quantity,
            stop_pct,
            take_profit_pct,
            next_id: 0,
        }
    }

    fn holding_for<'a>(symbol: &Symbol, positions: &'a HashMap<String, Position>) -> Option<(&'a str, &'a btk_portfolio::HoldingPosition)> {
        positions.iter().find_map(|(id, p)| match p {
            Position::Holding(h) if &h.symbol == symbol => Some((id.as_str(), h)),
            _ => None,
        })
    }

    fn has_open_entry(symbol: &Symbol, positions: &HashMap<String, Position>) -> bool {
        positions.values().any(|p| match p {
            Position::Entering(e) => &e.symbol == symbol,
            Position::Holding(h) => &h.symbol == symbol,
            Position::Exiting(e) => &e.symbol == symbol,
            Position::Closed(_) => false,
        })
    }
}

impl Strategy for EmaCrossStrategy {
    fn name(&self) -> &str {
        "ema_cross"
    }

    fn on_market_close(&mut self, ctx: &mut StrategyContext) -> Vec<PositionTransition> {
        let mut out = Vec::new();
        for symbol in self.symbols.clone() {
            let Some(bar) = ctx.get_price(&symbol) else {
                continue;
            };
            let Some(ema) = ctx.get_indicator(&symbol, IndicatorKind::Ema, self.ema_period, Cadence::Daily) else {
                continue;
            };
            let close = bar.close.to_f64();

            if let Some((id, holding)) = Self::holding_for(&symbol, ctx.positions) {
                let hit_stop = holding
                    .risk_params
                    .stop_price
                    .is_some_and(|sp| close <= sp.to_f64());
                let hit_take_profit = holding
                    .risk_params
                    .take_profit_price
                    .is_some_and(|tp| close >= tp.to_f64());
                let reason = if hit_stop {
                    Some("stop loss")
                } else if hit_take_profit {
                    Some("take profit")
                } else if close < ema {
                    Some("close crossed below EMA")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    out.push(PositionTransition::TriggerExit {
                        id: id.to_string(),
                        quantity: self.quantity,
                        reason: reason.to_string(),
                        order_style: OrderStyle::Market,
                    });
                }
                continue;
            }

            if Self::has_open_entry(&symbol, ctx.positions) {
                continue;
            }

            if close > ema {
                self.next_id += 1;
                let stop = btk_core::Price::from_f64(close * (1.0 - self.stop_pct)).ok();
                let take_profit = btk_core::Price::from_f64(close * (1.0 + self.take_profit_pct)).ok();
                out.push(PositionTransition::OpenEntry {
                    id: format!("{symbol}-{}", self.next_id),
                    symbol: symbol.clone(),
                    side: Side::Buy,
                    quantity: self.quantity,
                    entry_reason: "close crossed above EMA".to_string(),
                    order_style: OrderStyle::Market,
                    risk_params: RiskParams {
                        stop_price: stop,
                        take_profit_price: take_profit,
                    },
                });
            }
        }
        out
    }
}
