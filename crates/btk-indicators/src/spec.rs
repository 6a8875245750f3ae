//! Indicator specification — the cache and compute-engine's shared key shape.

use btk_marketdata::Cadence;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Ema,
    Rsi,
    VolumeMa,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Ema => "ema",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::VolumeMa => "volume_ma",
        }
    }
}

/// Identifies one indicator series: kind, lookback period, and the cadence
/// its underlying bars are aggregated to before computation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndicatorSpec {
    pub kind: IndicatorKind,
    pub period: usize,
    pub cadence: Cadence,
}

impl IndicatorSpec {
    pub fn new(kind: IndicatorKind, period: usize, cadence: Cadence) -> Self {
        Self {
            kind,
            period,
            cadence,
        }
    }
}
