//! The day-stepping simulation driver (spec §4.7): wires marketdata,
//! indicators, strategy, execution, and portfolio together in the exact
//! pipeline order §4.7 specifies. Grounded on the teacher's
//! `BacktestEngine`'s single struct owning every subcomponent and replaying
//! bar-by-bar, trimmed of the risk/integrity/isolation layers this engine
//! doesn't carry (see `DESIGN.md`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use btk_core::{Order, OhlcBar, StatusCode, StatusError, Symbol, Tif, Trade};
use btk_execution::{ExecutionEngine, OrderBook};
use btk_indicators::{compute, CachedValue, IndicatorCache, IndicatorKind, IndicatorSpec};
use btk_marketdata::{convert, Cadence, PriceArchive, PriceSource};
use btk_portfolio::{apply_transition, ClosedPosition, Portfolio, Position, RiskParams, Transition as PTransition};
use btk_strategy::{OrderGenerator, PositionTransition, Strategy, StrategyContext};
use chrono::{Datelike, NaiveDate};

use crate::config::BacktestConfig;
use crate::metrics::MetricAccumulator;

/// Cooperative cancellation flag checked only at day boundaries (§5).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct StepResult {
    pub date: NaiveDate,
    pub portfolio_value_micros: i64,
    pub cash_micros: i64,
    pub trades: Vec<Trade>,
    pub orders_submitted: Vec<Order>,
    pub closed_this_step: Vec<ClosedPosition>,
}

#[derive(Clone, Debug)]
pub struct BacktestReport {
    pub steps: Vec<StepResult>,
    pub metrics: HashMap<String, f64>,
}

fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + chrono::Duration::days(1);
    while matches!(next.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
        next += chrono::Duration::days(1);
    }
    next
}

/// True when `date` is the last day of the period `cadence` aggregates to
/// (§4.7 step 2). Mirrors `btk_marketdata::cadence`'s own `(year, week)`/
/// `(year, month)` grouping keys rather than its private period-end
/// calendar math, since only the period boundary — not the calendar day a
/// holiday might have left unrepresented — matters here.
fn is_period_end(date: NaiveDate, cadence: Cadence) -> bool {
    let next = date + chrono::Duration::days(1);
    match cadence {
        Cadence::Daily => true,
        Cadence::Weekly => {
            let cur = date.iso_week();
            let nxt = next.iso_week();
            (cur.year(), cur.week()) != (nxt.year(), nxt.week())
        }
        Cadence::Monthly => next.month() != date.month(),
    }
}

#[allow(clippy::too_many_arguments)]
fn fetch_indicator<S: PriceSource>(
    archive: &mut PriceArchive<S>,
    cache: &mut IndicatorCache,
    symbol: &Symbol,
    kind: IndicatorKind,
    period: usize,
    cadence: Cadence,
    date: NaiveDate,
) -> Option<f64> {
    let spec = IndicatorSpec::new(kind, period, cadence);
    if let Some(cached) = cache.get(symbol, &spec, date) {
        return Some(cached.value);
    }
    let earliest = NaiveDate::from_ymd_opt(1900, 1, 1)?;
    let daily = archive.get_prices(symbol, earliest, date).ok()?;
    let converted = convert(&daily, cadence, Some(date), false, false).ok()?;
    let bars: Vec<_> = converted.iter().map(|c| c.bar.clone()).collect();
    let points = compute(&bars, kind, period).ok()?;
    let last = points.last()?;
    let provisional = converted.last().is_some_and(|c| c.provisional);
    cache.insert(
        symbol.clone(),
        spec,
        date,
        CachedValue {
            value: last.value,
            provisional,
        },
    );
    Some(last.value)
}

fn transition_error(err: (Position, btk_portfolio::TransitionError)) -> StatusError {
    StatusError::invalid_argument(err.1.to_string())
}

pub struct SimulationDriver<S: PriceSource> {
    config: BacktestConfig,
    archive: PriceArchive<S>,
    watchlist: Vec<Symbol>,
    strategy: Box<dyn Strategy>,
    indicator_cache: IndicatorCache,
    order_book: OrderBook,
    engine: ExecutionEngine,
    portfolio: Portfolio,
    positions: HashMap<String, Position>,
    order_to_position: HashMap<String, String>,
    pending_risk_params: HashMap<String, RiskParams>,
    current_date: NaiveDate,
}

impl<S: PriceSource> SimulationDriver<S> {
    pub fn create(
        config: BacktestConfig,
        watchlist: Vec<Symbol>,
        archive: PriceArchive<S>,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self, StatusError> {
        if config.start_date > config.end_date {
            return Err(StatusError::invalid_argument(format!(
                "start_date {} is after end_date {}",
                config.start_date, config.end_date
            )));
        }
        let engine = ExecutionEngine::new(config.commission);
        let portfolio =
            Portfolio::new(config.initial_cash_micros, config.accounting_method).with_strict_cash(config.strict_cash);
        let current_date = config.start_date;
        Ok(Self {
            config,
            archive,
            watchlist,
            strategy,
            indicator_cache: IndicatorCache::new(),
            order_book: OrderBook::new(),
            engine,
            portfolio,
            positions: HashMap::new(),
            order_to_position: HashMap::new(),
            pending_risk_params: HashMap::new(),
            current_date,
        })
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    fn take_position(&mut self, id: &str) -> Result<Position, StatusError> {
        self.positions
            .remove(id)
            .ok_or_else(|| StatusError::not_found(format!("position '{id}' not found")))
    }

    /// Runs one day of the §4.7 pipeline and advances `current_date`.
    /// Returns `Ok(None)` once `current_date` has passed `end_date`.
    pub fn step(&mut self) -> Result<Option<StepResult>, StatusError> {
        if self.current_date > self.config.end_date {
            return Ok(None);
        }
        let today = self.current_date;

        // 1. Load today's bars for the watchlist.
        let mut today_bars: HashMap<Symbol, OhlcBar> = HashMap::new();
        for symbol in &self.watchlist {
            match self.archive.get_prices(symbol, today, today) {
                Ok(bars) => {
                    if let Some(bar) = bars.into_iter().next() {
                        today_bars.insert(symbol.clone(), bar);
                    }
                }
                Err(e) if e.code == StatusCode::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        // 2. Finalize indicator cadences at period end.
        for cadence in [Cadence::Weekly, Cadence::Monthly] {
            if is_period_end(today, cadence) {
                self.indicator_cache.finalize_period(cadence);
            }
        }

        // 3. Snapshot today's portfolio market value (cash + lot qty * today's
        // close) before any of today's trades are applied — §4.7 step 3 runs
        // before the strategy is invoked, against yesterday's cash/lots.
        let portfolio_value_micros = {
            let marks: HashMap<Symbol, i64> = today_bars.iter().map(|(s, b)| (s.clone(), b.close.micros())).collect();
            self.portfolio.market_value_micros(&marks)
        };

        // 4. Invoke the strategy with the capability closures.
        let transitions = {
            let archive = &mut self.archive;
            let cache = &mut self.indicator_cache;
            let positions = &self.positions;
            let bars_ref = &today_bars;
            let mut ctx = StrategyContext::new(
                today,
                positions,
                |symbol: &Symbol| bars_ref.get(symbol).cloned(),
                |symbol: &Symbol, kind, period, cadence| fetch_indicator(archive, cache, symbol, kind, period, cadence, today),
            );
            self.strategy.on_market_close(&mut ctx)
        };

        // 5. Apply transitions to the positions map; collect orders.
        let mut orders_to_submit = Vec::new();
        for transition in &transitions {
            match transition {
                PositionTransition::OpenEntry {
                    id,
                    symbol,
                    side,
                    quantity,
                    entry_reason,
                    risk_params,
                    ..
                } => {
                    if self.positions.contains_key(id) {
                        return Err(StatusError::already_exists(format!("position id '{id}' already exists")));
                    }
                    let order = OrderGenerator::orders_for(transition, None, today)?.ok_or_else(|| {
                        StatusError::internal(format!("OpenEntry for '{id}' produced no order"))
                    })?;
                    let position =
                        Position::new_entering(id.clone(), symbol.clone(), *side, entry_reason.clone(), *quantity, today);
                    self.positions.insert(id.clone(), position);
                    self.pending_risk_params.insert(id.clone(), risk_params.clone());
                    self.order_to_position.insert(order.id.clone(), id.clone());
                    orders_to_submit.push(order);
                }

                PositionTransition::CancelEntry { id, reason } => {
                    let position = self.take_position(id)?;
                    let updated = apply_transition(
                        position,
                        PTransition::CancelEntry {
                            reason: reason.clone(),
                            date: today,
                        },
                    )
                    .map_err(transition_error)?;
                    self.positions.insert(id.clone(), updated);
                }

                PositionTransition::TriggerExit {
                    id, quantity, reason, ..
                } => {
                    let position = self.take_position(id)?;
                    let order = OrderGenerator::orders_for(transition, Some(&position), today)?;
                    let updated = apply_transition(
                        position,
                        PTransition::TriggerExit {
                            reason: reason.clone(),
                            target_qty: *quantity,
                            date: today,
                        },
                    )
                    .map_err(transition_error)?;
                    self.positions.insert(id.clone(), updated);
                    if let Some(order) = order {
                        self.order_to_position.insert(order.id.clone(), id.clone());
                        orders_to_submit.push(order);
                    }
                }

                PositionTransition::AdjustRisk { id, risk_params } => {
                    let position = self.take_position(id)?;
                    let updated = apply_transition(
                        position,
                        PTransition::UpdateRiskParams {
                            new: risk_params.clone(),
                            date: today,
                        },
                    )
                    .map_err(transition_error)?;
                    self.positions.insert(id.clone(), updated);
                }
            }
        }

        // 6. Submit new orders to the order book.
        for order in &orders_to_submit {
            self.order_book.register(order.clone())?;
        }

        // 7. Feed today's bars into the engine.
        let bars_vec: Vec<_> = today_bars.values().cloned().collect();
        self.engine.update_market(&bars_vec, &self.config.path_config);

        // 8. Run the engine.
        let reports = self.engine.process_orders(&mut self.order_book, today)?;

        // 9. Apply the produced trades to the portfolio in report order.
        let trades: Vec<Trade> = reports.iter().flat_map(|r| r.trades.clone()).collect();
        let enriched = if trades.is_empty() {
            Vec::new()
        } else {
            self.portfolio.apply_trades(&trades)?
        };

        let mut closed_this_step = Vec::new();
        for trade in &enriched {
            let Some(position_id) = self.order_to_position.get(&trade.order_id).cloned() else {
                continue;
            };
            let position = self.take_position(&position_id)?;
            let qty = trade.quantity.get();
            let updated = match position {
                Position::Entering(p) => {
                    let filled = apply_transition(
                        Position::Entering(p),
                        PTransition::EntryFill {
                            qty,
                            date: trade.timestamp,
                        },
                    )
                    .map_err(transition_error)?;
                    match filled {
                        Position::Entering(p) if p.filled_qty == p.target_qty => {
                            let risk_params = self.pending_risk_params.remove(&position_id).unwrap_or(RiskParams {
                                stop_price: None,
                                take_profit_price: None,
                            });
                            apply_transition(
                                Position::Entering(p),
                                PTransition::EntryComplete {
                                    avg_price: trade.price,
                                    risk_params,
                                    date: trade.timestamp,
                                },
                            )
                            .map_err(transition_error)?
                        }
                        other => other,
                    }
                }
                Position::Exiting(p) => {
                    let filled = apply_transition(
                        Position::Exiting(p),
                        PTransition::ExitFill {
                            qty,
                            date: trade.timestamp,
                        },
                    )
                    .map_err(transition_error)?;
                    match filled {
                        Position::Exiting(p) if p.filled_qty == p.target_qty => {
                            let completed = apply_transition(
                                Position::Exiting(p),
                                PTransition::ExitComplete {
                                    avg_exit_price: trade.price,
                                    date: trade.timestamp,
                                },
                            )
                            .map_err(transition_error)?;
                            if let Position::Closed(c) = &completed {
                                closed_this_step.push(c.clone());
                            }
                            completed
                        }
                        other => other,
                    }
                }
                other => other,
            };
            self.positions.insert(position_id, updated);
        }

        // 10. Cancel Day-TIF orders still pending at end of day; advance the date.
        let pending_day_orders: Vec<String> = self
            .order_book
            .active_orders()
            .into_iter()
            .filter(|o| o.time_in_force == Tif::Day)
            .map(|o| o.id.clone())
            .collect();
        for id in pending_day_orders {
            self.order_book.cancel(&id)?;
        }

        self.current_date = next_business_day(today);

        Ok(Some(StepResult {
            date: today,
            portfolio_value_micros,
            cash_micros: self.portfolio.cash_micros(),
            trades: enriched,
            orders_submitted: orders_to_submit,
            closed_this_step,
        }))
    }

    /// Drives steps from `start_date` through `end_date`, accumulating step
    /// results and updating every metric accumulator in day order.
    /// Cancellation is observed only at day boundaries. On a per-day error,
    /// returns the accumulated prefix of step results alongside the error
    /// (§7).
    pub fn run(
        &mut self,
        metrics: &mut [Box<dyn MetricAccumulator>],
        cancel: &CancellationToken,
    ) -> Result<BacktestReport, (Vec<StepResult>, StatusError)> {
        for m in metrics.iter_mut() {
            m.init(&self.config);
        }
        let mut steps = Vec::new();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.step() {
                Ok(Some(result)) => {
                    for m in metrics.iter_mut() {
                        m.update(&result);
                    }
                    steps.push(result);
                }
                Ok(None) => break,
                Err(e) => return Err((steps, e)),
            }
        }
        let metric_set = metrics
            .iter()
            .map(|m| (m.name().to_string(), m.finalize(&self.config)))
            .collect();
        Ok(BacktestReport { steps, metrics: metric_set })
    }
}
