//! Metric accumulators (spec §4.8, §9): `init`/`update`/`finalize` over the
//! accumulated step results. Grounded structurally on
//! `PerformanceAnalyzer::calculate_risk_ratios`/`calculate_drawdown`'s
//! single-pass mean/variance/peak-tracking style from the pack's
//! `services-reporting` example, adapted to this engine's exact formulas and
//! its closed-position/`StepResult` inputs rather than raw fills.

use crate::config::BacktestConfig;
use crate::driver::StepResult;
use btk_portfolio::ClosedPosition;

/// A named scalar-producing pass over the run's step results. The driver
/// holds a `Vec<Box<dyn MetricAccumulator>>` — one dynamic-dispatch seam,
/// matching the teacher's "type erasure at exactly one seam" design note.
pub trait MetricAccumulator {
    fn name(&self) -> &str;
    fn init(&mut self, config: &BacktestConfig);
    fn update(&mut self, step: &StepResult);
    fn finalize(&self, config: &BacktestConfig) -> f64;
}

/// Total realized P&L, average holding days, win/loss counts, and win rate
/// over every closed round-trip observed during the run.
#[derive(Default)]
pub struct SummaryMetrics {
    closed: Vec<ClosedPosition>,
}

impl SummaryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_realized_pnl_micros(&self) -> i64 {
        self.closed.iter().map(|c| c.net_pnl_micros).sum()
    }

    pub fn average_holding_days(&self) -> f64 {
        if self.closed.is_empty() {
            return 0.0;
        }
        let total: i64 = self.closed.iter().map(|c| c.days_held).sum();
        total as f64 / self.closed.len() as f64
    }

    pub fn win_count(&self) -> usize {
        self.closed.iter().filter(|c| c.net_pnl_micros > 0).count()
    }

    pub fn loss_count(&self) -> usize {
        self.closed.iter().filter(|c| c.net_pnl_micros < 0).count()
    }

    pub fn win_rate(&self) -> f64 {
        if self.closed.is_empty() {
            return 0.0;
        }
        self.win_count() as f64 / self.closed.len() as f64
    }
}

impl MetricAccumulator for SummaryMetrics {
    fn name(&self) -> &str {
        "summary.total_realized_pnl"
    }

    fn init(&mut self, _config: &BacktestConfig) {
        self.closed.clear();
    }

    fn update(&mut self, step: &StepResult) {
        self.closed.extend(step.closed_this_step.iter().cloned());
    }

    fn finalize(&self, _config: &BacktestConfig) -> f64 {
        self.total_realized_pnl_micros() as f64 / btk_core::MICROS_PER_UNIT as f64
    }
}

/// Annualized Sharpe ratio over daily portfolio-value returns (§4.8):
/// `((mean(r) - risk_free_rate/252) / stddev(r)) * sqrt(252)`, or 0 with
/// fewer than two return observations or zero variance.
#[derive(Default)]
pub struct SharpeRatio {
    values: Vec<i64>,
}

impl SharpeRatio {
    pub fn new() -> Self {
        Self::default()
    }

    fn daily_returns(&self) -> Vec<f64> {
        self.values
            .windows(2)
            .filter_map(|w| {
                let (prev, cur) = (w[0] as f64, w[1] as f64);
                if prev == 0.0 {
                    None
                } else {
                    Some((cur - prev) / prev)
                }
            })
            .collect()
    }
}

impl MetricAccumulator for SharpeRatio {
    fn name(&self) -> &str {
        "sharpe_ratio"
    }

    fn init(&mut self, _config: &BacktestConfig) {
        self.values.clear();
    }

    fn update(&mut self, step: &StepResult) {
        self.values.push(step.portfolio_value_micros);
    }

    fn finalize(&self, config: &BacktestConfig) -> f64 {
        let returns = self.daily_returns();
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return 0.0;
        }
        ((mean - config.risk_free_rate / 252.0) / std_dev) * 252.0_f64.sqrt()
    }
}

/// Maximum drawdown in percent over the portfolio-value series (§4.8):
/// running peak, `drawdown = (peak - v) / peak`, result is the maximum
/// observed. Returns 0 when no decline is observed.
#[derive(Default)]
pub struct MaxDrawdown {
    values: Vec<i64>,
}

impl MaxDrawdown {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricAccumulator for MaxDrawdown {
    fn name(&self) -> &str {
        "max_drawdown_percent"
    }

    fn init(&mut self, _config: &BacktestConfig) {
        self.values.clear();
    }

    fn update(&mut self, step: &StepResult) {
        self.values.push(step.portfolio_value_micros);
    }

    fn finalize(&self, _config: &BacktestConfig) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mut peak = self.values[0] as f64;
        let mut max_dd = 0.0f64;
        for &v in &self.values {
            let v = v as f64;
            if v > peak {
                peak = v;
            }
            if peak > 0.0 {
                let dd = (peak - v) / peak;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }
        max_dd * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btk_core::Side;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn config() -> BacktestConfig {
        BacktestConfig::test_defaults(d(1), d(10))
    }

    fn step(value: i64) -> StepResult {
        StepResult {
            date: d(1),
            portfolio_value_micros: value,
            cash_micros: value,
            trades: Vec::new(),
            orders_submitted: Vec::new(),
            closed_this_step: Vec::new(),
        }
    }

    #[test]
    fn sharpe_is_zero_with_fewer_than_three_values() {
        let mut m = SharpeRatio::new();
        m.init(&config());
        m.update(&step(100_000_000));
        assert_eq!(m.finalize(&config()), 0.0);
    }

    #[test]
    fn sharpe_is_positive_for_steadily_rising_value() {
        let mut m = SharpeRatio::new();
        m.init(&config());
        for v in [100_000_000, 101_000_000, 102_010_000, 103_030_100] {
            m.update(&step(v));
        }
        assert!(m.finalize(&config()) > 0.0);
    }

    #[test]
    fn max_drawdown_tracks_peak_to_trough() {
        let mut m = MaxDrawdown::new();
        m.init(&config());
        for v in [100_000_000, 110_000_000, 88_000_000, 95_000_000] {
            m.update(&step(v));
        }
        // (110 - 88) / 110 * 100 = 20%
        assert!((m.finalize(&config()) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn max_drawdown_is_zero_with_no_decline() {
        let mut m = MaxDrawdown::new();
        m.init(&config());
        for v in [100_000_000, 110_000_000, 120_000_000] {
            m.update(&step(v));
        }
        assert_eq!(m.finalize(&config()), 0.0);
    }

    #[test]
    fn summary_counts_wins_and_losses() {
        let closed_win = ClosedPosition {
            id: "p1".into(),
            symbol: "AAPL".into(),
            side: Side::Buy,
            entry_price: None,
            entry_date: None,
            exit_price: None,
            exit_date: None,
            quantity: 10,
            gross_pnl_micros: 500_000_000,
            net_pnl_micros: 500_000_000,
            return_percent: 5.0,
            days_held: 3,
            close_reason: "take profit".into(),
            last_updated: d(5),
        };
        let closed_loss = ClosedPosition {
            net_pnl_micros: -200_000_000,
            gross_pnl_micros: -200_000_000,
            ..closed_win.clone()
        };
        let mut m = SummaryMetrics::new();
        m.init(&config());
        m.update(&StepResult {
            closed_this_step: vec![closed_win, closed_loss],
            ..step(0)
        });
        assert_eq!(m.win_count(), 1);
        assert_eq!(m.loss_count(), 1);
        assert_eq!(m.win_rate(), 0.5);
        assert_eq!(m.total_realized_pnl_micros(), 300_000_000);
    }
}
