//! Lot-tracked portfolio accounting (spec §4.4). Grounded on
//! `mqk-portfolio::accounting`'s FIFO cash/lot mechanics, generalized with
//! a `WeightedAverage` policy the teacher's ledger doesn't implement, and
//! the commission pro-ration rule resolved in `DESIGN.md`.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use btk_core::{Side, StatusError, Symbol, Trade};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccountingMethod {
    Fifo,
    WeightedAverage,
}

/// A held lot. Positive `quantity` is long, negative is short.
/// `cost_basis_total` is the total cash outlay (including its share of
/// commission) in micros, always stored as a positive magnitude.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lot {
    pub quantity: i64,
    pub cost_basis_total: i64,
    pub acquisition_date: NaiveDate,
}

impl Lot {
    pub fn avg_cost_micros(&self) -> i64 {
        self.cost_basis_total / self.quantity.abs()
    }
}

/// Splits `total_commission` across `qtys` (which must sum to `trade_qty`)
/// proportionally to quantity, per DESIGN.md resolution 3: `C * q_i / Q`
/// with the last segment absorbing the rounding remainder so the shares
/// always sum to exactly `C`.
fn allocate_commission(total_commission: i64, trade_qty: i64, qtys: &[i64]) -> Vec<i64> {
    let mut allocated = 0i64;
    let mut out = Vec::with_capacity(qtys.len());
    for (i, q) in qtys.iter().enumerate() {
        if i + 1 == qtys.len() {
            out.push(total_commission - allocated);
        } else {
            let share = total_commission * q / trade_qty;
            allocated += share;
            out.push(share);
        }
    }
    out
}

fn open_or_add(
    lots: &mut Vec<Lot>,
    method: AccountingMethod,
    qty: i64,
    price_micros: i64,
    commission_micros: i64,
    date: NaiveDate,
    sign: i64,
) {
    let cost = qty.saturating_mul(price_micros).saturating_add(commission_micros);
    match method {
        AccountingMethod::Fifo => lots.push(Lot {
            quantity: sign * qty,
            cost_basis_total: cost,
            acquisition_date: date,
        }),
        AccountingMethod::WeightedAverage => match lots.first_mut() {
            Some(lot) => {
                lot.quantity += sign * qty;
                lot.cost_basis_total += cost;
            }
            None => lots.push(Lot {
                quantity: sign * qty,
                cost_basis_total: cost,
                acquisition_date: date,
            }),
        },
    }
}

/// Consumes up to `trade_qty` from the opposite-direction lots held in
/// `lots` (FIFO order, or the single weighted-average lot), realizing P&L
/// per `pnl_per_unit(avg_cost, trade_price)`. Any quantity beyond what was
/// held opens a new `sign`-signed lot at the remaining price basis.
/// Returns total realized P&L in micros.
#[allow(clippy::too_many_arguments)]
fn close_against(
    lots: &mut Vec<Lot>,
    method: AccountingMethod,
    trade_qty: i64,
    trade_price_micros: i64,
    commission_micros: i64,
    date: NaiveDate,
    opening_sign: i64,
    pnl_per_unit: impl Fn(i64, i64) -> i64,
) -> i64 {
    let mut to_consume = trade_qty;
    let mut consumed: Vec<(usize, i64)> = Vec::new();

    match method {
        AccountingMethod::Fifo => {
            let mut i = 0;
            while to_consume > 0 && i < lots.len() {
                let take = lots[i].quantity.abs().min(to_consume);
                consumed.push((i, take));
                to_consume -= take;
                i += 1;
            }
        }
        AccountingMethod::WeightedAverage => {
            if let Some(lot) = lots.first() {
                let take = lot.quantity.abs().min(to_consume);
                consumed.push((0, take));
                to_consume -= take;
            }
        }
    }

    let leftover = to_consume;
    let mut segment_qtys: Vec<i64> = consumed.iter().map(|&(_, q)| q).collect();
    if leftover > 0 {
        segment_qtys.push(leftover);
    }
    let shares = allocate_commission(commission_micros, trade_qty, &segment_qtys);

    let mut realized_micros = 0i64;
    for (seg, &(lot_idx, consumed_qty)) in consumed.iter().enumerate() {
        let avg_cost = lots[lot_idx].avg_cost_micros();
        let gross = pnl_per_unit(avg_cost, trade_price_micros).saturating_mul(consumed_qty);
        realized_micros = realized_micros.saturating_add(gross.saturating_sub(shares[seg]));
    }

    // Shrink/remove consumed lots back-to-front so earlier indices stay valid.
    for &(lot_idx, consumed_qty) in consumed.iter().rev() {
        let remaining_abs = lots[lot_idx].quantity.abs() - consumed_qty;
        if remaining_abs == 0 {
            lots.remove(lot_idx);
        } else {
            let avg_cost = lots[lot_idx].avg_cost_micros();
            lots[lot_idx].quantity = opening_sign.saturating_neg() * remaining_abs;
            lots[lot_idx].cost_basis_total = avg_cost * remaining_abs;
        }
    }

    if leftover > 0 {
        let share = *shares.last().expect("leftover implies at least one segment");
        let cost = leftover.saturating_mul(trade_price_micros).saturating_add(share);
        lots.push(Lot {
            quantity: opening_sign * leftover,
            cost_basis_total: cost,
            acquisition_date: date,
        });
    }

    realized_micros
}

fn apply_buy(
    lots: &mut Vec<Lot>,
    method: AccountingMethod,
    qty: i64,
    price_micros: i64,
    commission_micros: i64,
    date: NaiveDate,
) -> Option<i64> {
    let held_short = lots.first().is_some_and(|l| l.quantity < 0);
    if held_short {
        Some(close_against(
            lots,
            method,
            qty,
            price_micros,
            commission_micros,
            date,
            1,
            |short_avg_cost, buy_price| short_avg_cost - buy_price,
        ))
    } else {
        open_or_add(lots, method, qty, price_micros, commission_micros, date, 1);
        None
    }
}

fn apply_sell(
    lots: &mut Vec<Lot>,
    method: AccountingMethod,
    qty: i64,
    price_micros: i64,
    commission_micros: i64,
    date: NaiveDate,
) -> Option<i64> {
    let held_long = lots.first().is_some_and(|l| l.quantity > 0);
    if held_long {
        Some(close_against(
            lots,
            method,
            qty,
            price_micros,
            commission_micros,
            date,
            -1,
            |long_avg_cost, sell_price| sell_price - long_avg_cost,
        ))
    } else {
        open_or_add(lots, method, qty, price_micros, commission_micros, date, -1);
        None
    }
}

/// Lot-tracked holdings, cash, and realized P&L for one run. `apply_trades`
/// is all-or-nothing (spec §4.4/§7): a failing trade leaves the portfolio
/// completely unchanged.
#[derive(Clone, Debug)]
pub struct Portfolio {
    initial_cash_micros: i64,
    cash_micros: i64,
    accounting_method: AccountingMethod,
    strict_cash: bool,
    holdings: HashMap<Symbol, Vec<Lot>>,
    realized_pnl_total_micros: i64,
    applied_trade_ids: HashSet<String>,
}

impl Portfolio {
    pub fn new(initial_cash_micros: i64, accounting_method: AccountingMethod) -> Self {
        Self {
            initial_cash_micros,
            cash_micros: initial_cash_micros,
            accounting_method,
            strict_cash: false,
            holdings: HashMap::new(),
            realized_pnl_total_micros: 0,
            applied_trade_ids: HashSet::new(),
        }
    }

    /// Reject any trade batch that would drive cash negative (spec §4.4's
    /// "may reject orders it cannot cover via a pre-trade check").
    pub fn with_strict_cash(mut self, strict: bool) -> Self {
        self.strict_cash = strict;
        self
    }

    pub fn initial_cash_micros(&self) -> i64 {
        self.initial_cash_micros
    }

    pub fn cash_micros(&self) -> i64 {
        self.cash_micros
    }

    pub fn realized_pnl_total_micros(&self) -> i64 {
        self.realized_pnl_total_micros
    }

    pub fn accounting_method(&self) -> AccountingMethod {
        self.accounting_method
    }

    pub fn lots(&self, symbol: &Symbol) -> &[Lot] {
        self.holdings.get(symbol).map_or(&[], |v| v.as_slice())
    }

    pub fn net_quantity(&self, symbol: &Symbol) -> i64 {
        self.holdings
            .get(symbol)
            .map(|lots| lots.iter().map(|l| l.quantity).sum())
            .unwrap_or(0)
    }

    /// Market value of the portfolio: cash plus each symbol's net quantity
    /// marked at `marks` (missing marks are treated as 0, per §4.7 step 3's
    /// "today's close" lookup failing only when a symbol has no bar yet).
    pub fn market_value_micros(&self, marks: &HashMap<Symbol, i64>) -> i64 {
        let holdings_value: i64 = self
            .holdings
            .iter()
            .map(|(symbol, lots)| {
                let qty: i64 = lots.iter().map(|l| l.quantity).sum();
                qty.saturating_mul(*marks.get(symbol).unwrap_or(&0))
            })
            .sum();
        self.cash_micros.saturating_add(holdings_value)
    }

    /// Applies `trades` in order, all-or-nothing. Returns the same trades
    /// with `realized_pnl` filled in. On failure, `self` is left untouched.
    pub fn apply_trades(&mut self, trades: &[Trade]) -> Result<Vec<Trade>, StatusError> {
        let mut scratch = self.clone();
        let mut enriched = Vec::with_capacity(trades.len());

        for trade in trades {
            if scratch.applied_trade_ids.contains(&trade.id) {
                return Err(StatusError::failed_precondition(format!(
                    "duplicate trade id '{}' replayed",
                    trade.id
                )));
            }

            let lots = scratch.holdings.entry(trade.symbol.clone()).or_default();
            let qty = trade.quantity.get();
            let price_micros = trade.price.micros();
            let commission_micros = trade.commission.micros();

            let pnl = match trade.side {
                Side::Buy => {
                    scratch.cash_micros = scratch
                        .cash_micros
                        .saturating_sub(qty.saturating_mul(price_micros))
                        .saturating_sub(commission_micros);
                    apply_buy(lots, scratch.accounting_method, qty, price_micros, commission_micros, trade.timestamp)
                }
                Side::Sell => {
                    scratch.cash_micros = scratch
                        .cash_micros
                        .saturating_add(qty.saturating_mul(price_micros))
                        .saturating_sub(commission_micros);
                    apply_sell(lots, scratch.accounting_method, qty, price_micros, commission_micros, trade.timestamp)
                }
            };

            if lots.is_empty() {
                scratch.holdings.remove(&trade.symbol);
            }
            if scratch.strict_cash && scratch.cash_micros < 0 {
                return Err(StatusError::failed_precondition(format!(
                    "trade '{}' would drive cash negative under strict accounting mode",
                    trade.id
                )));
            }

            scratch.realized_pnl_total_micros =
                scratch.realized_pnl_total_micros.saturating_add(pnl.unwrap_or(0));
            scratch.applied_trade_ids.insert(trade.id.clone());

            let mut enriched_trade = trade.clone();
            enriched_trade.realized_pnl = pnl;
            enriched.push(enriched_trade);
        }

        *self = scratch;
        Ok(enriched)
    }
}
