//! On-disk run configuration: a single YAML file, no layered merge (unlike
//! the teacher's `mqk-config`, which this engine has no multi-environment
//! promotion concern to justify — see `SPEC_FULL.md`). Deserializes into
//! plain-primitive fields, then converts into `btk_backtest::BacktestConfig`
//! plus the watchlist/archive-directory/strategy knobs the driver needs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use btk_execution::{CommissionConfig, PathConfig, PathProfile};
use btk_portfolio::AccountingMethod;
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RunConfigFile {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_cash: f64,
    #[serde(default = "default_commission_per_share")]
    pub commission_per_share: f64,
    #[serde(default = "default_commission_minimum")]
    pub commission_minimum: f64,
    #[serde(default)]
    pub accounting_method: AccountingMethodField,
    #[serde(default)]
    pub strict_cash: bool,
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default = "default_path_points")]
    pub path_points: usize,
    #[serde(default)]
    pub path_profile: PathProfileField,
    pub path_seed: Option<u64>,
    #[serde(default = "default_degrees_of_freedom")]
    pub path_degrees_of_freedom: f64,
    pub symbols: Vec<String>,
    pub data_dir: PathBuf,
    #[serde(default = "default_ema_period")]
    pub ema_period: usize,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default = "default_stop_pct")]
    pub stop_pct: f64,
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,
}

fn default_commission_per_share() -> f64 {
    0.01
}
fn default_commission_minimum() -> f64 {
    1.0
}
fn default_path_points() -> usize {
    390
}
fn default_degrees_of_freedom() -> f64 {
    4.0
}
fn default_ema_period() -> usize {
    5
}
fn default_quantity() -> i64 {
    10
}
fn default_stop_pct() -> f64 {
    0.05
}
fn default_take_profit_pct() -> f64 {
    0.10
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountingMethodField {
    #[default]
    Fifo,
    WeightedAverage,
}

impl From<AccountingMethodField> for AccountingMethod {
    fn from(value: AccountingMethodField) -> Self {
        match value {
            AccountingMethodField::Fifo => AccountingMethod::Fifo,
            AccountingMethodField::WeightedAverage => AccountingMethod::WeightedAverage,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathProfileField {
    #[default]
    UShaped,
    JShaped,
    ReverseJ,
    Uniform,
}

impl From<PathProfileField> for PathProfile {
    fn from(value: PathProfileField) -> Self {
        match value {
            PathProfileField::UShaped => PathProfile::UShaped,
            PathProfileField::JShaped => PathProfile::JShaped,
            PathProfileField::ReverseJ => PathProfile::ReverseJ,
            PathProfileField::Uniform => PathProfile::Uniform,
        }
    }
}

impl RunConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading run config at {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing run config at {}", path.display()))
    }

    pub fn backtest_config(&self) -> Result<btk_backtest::BacktestConfig> {
        let per_share = btk_core::Price::from_f64(self.commission_per_share)
            .context("commission_per_share")?;
        let minimum =
            btk_core::Price::from_f64(self.commission_minimum).context("commission_minimum")?;
        let initial_cash_micros =
            (self.initial_cash * btk_core::MICROS_PER_UNIT as f64).round() as i64;
        Ok(btk_backtest::BacktestConfig {
            start_date: self.start_date,
            end_date: self.end_date,
            initial_cash_micros,
            commission: CommissionConfig { per_share, minimum },
            accounting_method: self.accounting_method.into(),
            path_config: PathConfig {
                total_points: self.path_points,
                profile: self.path_profile.into(),
                seed: self.path_seed,
                degrees_of_freedom: self.path_degrees_of_freedom,
            },
            risk_free_rate: self.risk_free_rate,
            strict_cash: self.strict_cash,
        })
    }
}
