//! Order matching against generated intraday paths (§4.6).

use std::collections::HashMap;

use btk_core::{OhlcBar, OrderKind, OrderStatus, Price, Quantity, Side, StatusError, Symbol, Trade};
use chrono::NaiveDate;

use crate::book::OrderBook;
use crate::path::{generate_path, might_fill, PathConfig};

#[derive(Copy, Clone, Debug)]
pub struct CommissionConfig {
    pub per_share: Price,
    pub minimum: Price,
}

impl CommissionConfig {
    pub fn compute(&self, qty: i64) -> Price {
        let variable = self.per_share.micros().saturating_mul(qty);
        Price::from_micros_unchecked(variable.max(self.minimum.micros()))
    }
}

#[derive(Clone, Debug)]
pub struct ExecutionReport {
    pub order_id: String,
    pub status: OrderStatus,
    pub trades: Vec<Trade>,
}

/// Matches orders against the day's generated paths. Owns per-symbol bars
/// and paths for the current day, a commission schedule, and a per-order
/// "has this stop already triggered" flag that survives across days for
/// orders that trigger but don't fill the same day (§4.6 State).
pub struct ExecutionEngine {
    commission: CommissionConfig,
    bars: HashMap<Symbol, OhlcBar>,
    paths: HashMap<Symbol, Vec<Price>>,
    stop_triggered: HashMap<String, bool>,
    next_trade_seq: u64,
}

impl ExecutionEngine {
    pub fn new(commission: CommissionConfig) -> Self {
        Self {
            commission,
            bars: HashMap::new(),
            paths: HashMap::new(),
            stop_triggered: HashMap::new(),
            next_trade_seq: 0,
        }
    }

    /// Generates and stores today's path for each bar, keyed by symbol.
    pub fn update_market(&mut self, bars: &[OhlcBar], path_config: &PathConfig) {
        for bar in bars {
            let path = generate_path(bar, path_config);
            self.paths.insert(bar.symbol.clone(), path);
            self.bars.insert(bar.symbol.clone(), bar.clone());
        }
    }

    /// Sweeps every active order in `book` against today's paths, in
    /// registry insertion order (§5's tie-break rule falls naturally out of
    /// iterating [`OrderBook::active_orders`] in that order). Mutates
    /// `book` in place, marking filled orders `Filled`.
    pub fn process_orders(
        &mut self,
        book: &mut OrderBook,
        today: NaiveDate,
    ) -> Result<Vec<ExecutionReport>, StatusError> {
        let active_ids: Vec<String> = book
            .active_orders()
            .into_iter()
            .map(|o| o.id.clone())
            .collect();

        let mut reports = Vec::new();
        for id in active_ids {
            let (symbol, side, kind, remaining) = {
                let order = book.get(&id)?;
                (
                    order.symbol.clone(),
                    order.side,
                    order.kind,
                    order.remaining_qty(),
                )
            };

            let bar = match self.bars.get(&symbol) {
                Some(b) => b.clone(),
                None => continue,
            };
            if !might_fill(&bar, side, kind) {
                continue;
            }
            let path = match self.paths.get(&symbol) {
                Some(p) => p.clone(),
                None => continue,
            };

            let Some(fill_price) = self.resolve_fill(&id, side, kind, &path) else {
                continue;
            };

            let qty = Quantity::new(remaining).expect("active order always has positive remaining qty");
            let commission = self.commission.compute(qty.get());
            self.next_trade_seq += 1;
            let trade = Trade::new(
                format!("trade-{}", self.next_trade_seq),
                id.clone(),
                symbol.clone(),
                side,
                qty,
                fill_price,
                commission,
                today,
            );

            let order = book.get_mut(&id)?;
            order.filled_qty = order.quantity.get();
            order.status = OrderStatus::Filled;
            order.avg_fill_price = Some(fill_price);
            order.updated_at = today;

            reports.push(ExecutionReport {
                order_id: id,
                status: OrderStatus::Filled,
                trades: vec![trade],
            });
        }
        Ok(reports)
    }

    fn resolve_fill(&mut self, order_id: &str, side: Side, kind: OrderKind, path: &[Price]) -> Option<Price> {
        match kind {
            OrderKind::Market => path.last().copied(),
            OrderKind::Limit(l) => find_limit_fill(path, side, l),
            OrderKind::Stop(s) => self.resolve_stop(order_id, side, s, path, None),
            OrderKind::StopLimit { stop, limit } => {
                self.resolve_stop(order_id, side, stop, path, Some(limit))
            }
        }
    }

    /// Implements the Open-Question resolution in `DESIGN.md`: a stop that
    /// already triggered on a prior day behaves as a plain market/limit
    /// order from the start of today's path; one triggering for the first
    /// time today fills at the point after the trigger, or the trigger
    /// point itself if it is the path's last point.
    fn resolve_stop(
        &mut self,
        order_id: &str,
        side: Side,
        stop: Price,
        path: &[Price],
        limit: Option<Price>,
    ) -> Option<Price> {
        let already_triggered = *self.stop_triggered.get(order_id).unwrap_or(&false);
        if already_triggered {
            return match limit {
                None => path.last().copied(),
                Some(l) => find_limit_fill(path, side, l),
            };
        }

        let trigger_idx = path.iter().position(|p| match side {
            Side::Buy => *p >= stop,
            Side::Sell => *p <= stop,
        })?;
        self.stop_triggered.insert(order_id.to_string(), true);

        match limit {
            None => {
                let fill_idx = if trigger_idx + 1 < path.len() {
                    trigger_idx + 1
                } else {
                    trigger_idx
                };
                path.get(fill_idx).copied()
            }
            Some(l) => find_limit_fill(&path[trigger_idx..], side, l),
        }
    }
}

fn find_limit_fill(path: &[Price], side: Side, limit: Price) -> Option<Price> {
    match side {
        Side::Buy => path.iter().find(|p| **p <= limit).map(|p| (*p).min(limit)),
        Side::Sell => path.iter().find(|p| **p >= limit).map(|p| (*p).max(limit)),
    }
}
