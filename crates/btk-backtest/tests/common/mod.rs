//! Shared scaffolding for the `scenario_*` end-to-end tests: a fixed
//! in-memory `PriceSource`, bar construction, and a minimal risk-band
//! strategy stub exercising the full driver pipeline.

use std::collections::HashMap;

use btk_backtest::{BacktestConfig, CancellationToken, MetricAccumulator, SimulationDriver, SummaryMetrics};
use btk_core::{OhlcBar, Price, Side, StatusError, Symbol};
use btk_execution::{CommissionConfig, PathConfig, PathProfile};
use btk_indicators::IndicatorKind;
use btk_marketdata::{Cadence, PriceArchive, PriceSource};
use btk_portfolio::{AccountingMethod, Position, RiskParams};
use btk_strategy::{OrderStyle, PositionTransition, Strategy, StrategyContext};
use chrono::NaiveDate;

pub struct FixedSource {
    rows: HashMap<String, Vec<OhlcBar>>,
}

impl PriceSource for FixedSource {
    fn load_symbol(&self, symbol: &Symbol) -> Result<Vec<OhlcBar>, StatusError> {
        self.rows
            .get(symbol.as_str())
            .cloned()
            .ok_or_else(|| StatusError::not_found(format!("no rows for {symbol}")))
    }
}

/// Business days 2024-01-02 (Tue) .. 2024-01-12 (Fri), skipping the
/// weekend, so `next_business_day` never needs to skip inside this range.
pub fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn bar(symbol: &str, date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> OhlcBar {
    OhlcBar::new(
        symbol.into(),
        date,
        Price::from_f64(open).unwrap(),
        Price::from_f64(high).unwrap(),
        Price::from_f64(low).unwrap(),
        Price::from_f64(close).unwrap(),
        100_000,
    )
    .unwrap()
}

/// Enters long 10 shares of AAPL the first day `close > ema(5)`, exits on a
/// stop-loss or take-profit measured against the entry close, matching the
/// strategy shape spec §8's Scenario A/B describe.
pub struct RiskBandStrategy {
    pub symbol: Symbol,
    pub quantity: i64,
    pub stop_pct: f64,
    pub take_profit_pct: f64,
}

impl Strategy for RiskBandStrategy {
    fn name(&self) -> &str {
        "risk_band"
    }

    fn on_market_close(&mut self, ctx: &mut StrategyContext) -> Vec<PositionTransition> {
        let Some(bar) = ctx.get_price(&self.symbol) else {
            return Vec::new();
        };
        let Some(ema) = ctx.get_indicator(&self.symbol, IndicatorKind::Ema, 5, Cadence::Daily) else {
            return Vec::new();
        };
        let close = bar.close.to_f64();

        let holding = ctx.positions.iter().find_map(|(id, p)| match p {
            Position::Holding(h) if h.symbol == self.symbol => Some((id.as_str(), h)),
            _ => None,
        });

        if let Some((id, h)) = holding {
            let hit_stop = h.risk_params.stop_price.is_some_and(|sp| close <= sp.to_f64());
            let hit_take_profit = h
                .risk_params
                .take_profit_price
                .is_some_and(|tp| close >= tp.to_f64());
            if hit_stop || hit_take_profit {
                return vec![PositionTransition::TriggerExit {
                    id: id.to_string(),
                    quantity: self.quantity,
                    reason: if hit_stop { "stop loss".to_string() } else { "take profit".to_string() },
                    order_style: OrderStyle::Market,
                }];
            }
            return Vec::new();
        }

        let has_open = ctx.positions.values().any(|p| match p {
            Position::Entering(e) => e.symbol == self.symbol,
            Position::Exiting(e) => e.symbol == self.symbol,
            _ => false,
        });
        if has_open {
            return Vec::new();
        }

        if close > ema {
            let stop = Price::from_f64(close * (1.0 - self.stop_pct)).ok();
            let take_profit = Price::from_f64(close * (1.0 + self.take_profit_pct)).ok();
            return vec![PositionTransition::OpenEntry {
                id: "aapl-entry-1".to_string(),
                symbol: self.symbol.clone(),
                side: Side::Buy,
                quantity: self.quantity,
                entry_reason: "close crossed above EMA".to_string(),
                order_style: OrderStyle::Market,
                risk_params: RiskParams { stop_price: stop, take_profit_price: take_profit },
            }];
        }
        Vec::new()
    }
}

fn config() -> BacktestConfig {
    BacktestConfig {
        start_date: d(2),
        end_date: d(12),
        initial_cash_micros: 10_000_000_000,
        commission: CommissionConfig {
            per_share: Price::from_f64(0.01).unwrap(),
            minimum: Price::from_f64(1.0).unwrap(),
        },
        accounting_method: AccountingMethod::Fifo,
        path_config: PathConfig {
            total_points: 4,
            profile: PathProfile::UShaped,
            seed: Some(42),
            degrees_of_freedom: 4.0,
        },
        risk_free_rate: 0.0,
        strict_cash: false,
    }
}

/// Runs the full `SimulationDriver` pipeline over a daily close series
/// starting 2024-01-02, with wicks kept close to each day's close so the
/// 4-point path stays near the bar's own close (matching spec §8's "fills
/// near <the day's close>" scenario language).
pub fn run_with_bars(closes: &[f64]) -> btk_backtest::BacktestReport {
    let dates: Vec<NaiveDate> = (2..=12).map(d).collect();
    assert_eq!(dates.len(), closes.len());

    let mut rows = Vec::new();
    for (&close, &date) in closes.iter().zip(dates.iter()) {
        rows.push(bar("AAPL", date, close - 0.1, close + 0.5, close - 0.5, close));
    }
    let mut source_rows = HashMap::new();
    source_rows.insert("AAPL".to_string(), rows);
    let archive = PriceArchive::new(FixedSource { rows: source_rows });

    let strategy = Box::new(RiskBandStrategy {
        symbol: "AAPL".into(),
        quantity: 10,
        stop_pct: 0.05,
        take_profit_pct: 0.10,
    });

    let mut driver = SimulationDriver::create(config(), vec!["AAPL".into()], archive, strategy).unwrap();
    let mut metrics: Vec<Box<dyn MetricAccumulator>> = vec![Box::new(SummaryMetrics::new())];
    let cancel = CancellationToken::new();
    driver.run(&mut metrics, &cancel).unwrap()
}
