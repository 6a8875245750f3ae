//! Cadence- and provisional-aware indicator cache, keyed by
//! `(Symbol, IndicatorSpec, NaiveDate)` (§4.7 step 2, §4 indicator cache,
//! Open Question 4 — see `DESIGN.md`).

use std::collections::HashMap;

use btk_core::Symbol;
use btk_marketdata::Cadence;
use chrono::NaiveDate;

use crate::spec::IndicatorSpec;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CachedValue {
    pub value: f64,
    pub provisional: bool,
}

/// A simple key/value store, not a computation engine: callers (the
/// simulation driver) are responsible for deciding what to compute on a
/// miss and for calling [`IndicatorCache::insert`] with the right
/// `provisional` flag. This mirrors §4.7's description of the driver's
/// `get_indicator` capability, which owns the fetch/convert/compute path;
/// the cache itself only ever stores and evicts.
#[derive(Default)]
pub struct IndicatorCache {
    entries: HashMap<(Symbol, IndicatorSpec, NaiveDate), CachedValue>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, symbol: &Symbol, spec: &IndicatorSpec, date: NaiveDate) -> Option<CachedValue> {
        self.entries.get(&(symbol.clone(), *spec, date)).copied()
    }

    pub fn insert(&mut self, symbol: Symbol, spec: IndicatorSpec, date: NaiveDate, value: CachedValue) {
        self.entries.insert((symbol, spec, date), value);
    }

    /// Evicts every provisional entry whose spec cadence matches `cadence`.
    /// Called by the driver when `today` is a period end for that cadence
    /// (§4.7 step 2); after eviction, the next `get`/miss for those keys
    /// recomputes and caches the now-final value.
    pub fn finalize_period(&mut self, cadence: Cadence) {
        self.entries
            .retain(|(_, spec, _), v| !(spec.cadence == cadence && v.provisional));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::IndicatorKind;

    fn spec(cadence: Cadence) -> IndicatorSpec {
        IndicatorSpec::new(IndicatorKind::Ema, 5, cadence)
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn get_returns_none_on_miss() {
        let cache = IndicatorCache::new();
        assert!(cache
            .get(&"AAPL".into(), &spec(Cadence::Weekly), d("2024-01-03"))
            .is_none());
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut cache = IndicatorCache::new();
        let s = spec(Cadence::Weekly);
        cache.insert(
            "AAPL".into(),
            s,
            d("2024-01-03"),
            CachedValue {
                value: 150.2,
                provisional: true,
            },
        );
        let got = cache.get(&"AAPL".into(), &s, d("2024-01-03")).unwrap();
        assert!(got.provisional);
        assert!((got.value - 150.2).abs() < 1e-9);
    }

    #[test]
    fn finalize_period_evicts_only_provisional_matching_cadence() {
        let mut cache = IndicatorCache::new();
        let weekly = spec(Cadence::Weekly);
        let monthly = spec(Cadence::Monthly);
        cache.insert(
            "AAPL".into(),
            weekly,
            d("2024-01-03"),
            CachedValue {
                value: 1.0,
                provisional: true,
            },
        );
        cache.insert(
            "AAPL".into(),
            weekly,
            d("2023-12-29"),
            CachedValue {
                value: 2.0,
                provisional: false,
            },
        );
        cache.insert(
            "AAPL".into(),
            monthly,
            d("2024-01-03"),
            CachedValue {
                value: 3.0,
                provisional: true,
            },
        );

        cache.finalize_period(Cadence::Weekly);

        assert!(cache.get(&"AAPL".into(), &weekly, d("2024-01-03")).is_none());
        assert!(cache.get(&"AAPL".into(), &weekly, d("2023-12-29")).is_some());
        assert!(cache.get(&"AAPL".into(), &monthly, d("2024-01-03")).is_some());
    }
}
