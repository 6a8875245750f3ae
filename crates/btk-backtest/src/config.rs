//! Run configuration (spec §6 "Run inputs"), grounded on the teacher's
//! `BacktestConfig`/`test_defaults` shape, trimmed to the knobs this engine
//! actually has (no risk/integrity/corporate-action layers — out of scope).

use btk_execution::CommissionConfig;
use btk_execution::PathConfig;
use btk_portfolio::AccountingMethod;
use chrono::NaiveDate;

#[derive(Clone, Debug)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_cash_micros: i64,
    pub commission: CommissionConfig,
    pub accounting_method: AccountingMethod,
    pub path_config: PathConfig,
    /// Annualized risk-free rate used by the Sharpe-ratio accumulator
    /// (§4.8: `risk_free_rate/252` is subtracted from the mean daily
    /// return before annualizing).
    pub risk_free_rate: f64,
    /// When set, `Portfolio::apply_trades` rejects any trade that would
    /// drive cash negative (§4.4's "may reject orders it cannot cover via a
    /// pre-trade check if configured").
    pub strict_cash: bool,
}

impl BacktestConfig {
    /// Reasonable defaults for tests: a year-long window, $100k cash, a
    /// cent-per-share commission schedule, FIFO accounting, and a
    /// deterministically-seeded path profile.
    pub fn test_defaults(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            initial_cash_micros: 100_000_000_000,
            commission: CommissionConfig {
                per_share: btk_core::Price::from_f64(0.01).unwrap(),
                minimum: btk_core::Price::from_f64(1.0).unwrap(),
            },
            accounting_method: AccountingMethod::Fifo,
            path_config: PathConfig {
                total_points: 390,
                profile: btk_execution::PathProfile::UShaped,
                seed: Some(42),
                degrees_of_freedom: 4.0,
            },
            risk_free_rate: 0.0,
            strict_cash: false,
        }
    }
}
