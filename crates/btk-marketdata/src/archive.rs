//! Lazy per-symbol price archive (§4.1).

use std::collections::HashMap;

use btk_core::{OhlcBar, StatusError, Symbol};
use chrono::NaiveDate;

use crate::source::PriceSource;

/// Lazily-loaded, symbol-granularity price cache over an injected
/// [`PriceSource`]. Once a symbol's rows are loaded they are cached in full;
/// [`get_prices`](PriceArchive::get_prices) never caches a subrange on its
/// own, matching §4.1's "caches at symbol granularity" contract.
pub struct PriceArchive<S: PriceSource> {
    source: S,
    cache: HashMap<Symbol, Vec<OhlcBar>>,
}

impl<S: PriceSource> PriceArchive<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    fn ensure_loaded(&mut self, symbol: &Symbol) -> Result<(), StatusError> {
        if self.cache.contains_key(symbol) {
            return Ok(());
        }
        let rows = self.source.load_symbol(symbol)?;
        self.cache.insert(symbol.clone(), rows);
        Ok(())
    }

    /// Time-sorted bars for `symbol` within `[start, end]` inclusive.
    ///
    /// `NotFound` if the symbol has never produced any rows; `InvalidArgument`
    /// if `start > end`. Loads on first access; subsequent calls reuse the
    /// cached series.
    pub fn get_prices(
        &mut self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcBar>, StatusError> {
        if start > end {
            return Err(StatusError::invalid_argument(format!(
                "get_prices({symbol}): start {start} is after end {end}"
            )));
        }
        self.ensure_loaded(symbol)?;
        let rows = self.cache.get(symbol).expect("just loaded above");
        if rows.is_empty() {
            return Err(StatusError::not_found(format!(
                "symbol '{symbol}' has no data"
            )));
        }
        Ok(rows
            .iter()
            .filter(|bar| bar.date >= start && bar.date <= end)
            .cloned()
            .collect())
    }

    /// Eagerly load every symbol in `symbols`. Returns `Ok(())` if all
    /// succeed, or an aggregate `Internal` error naming every symbol that
    /// failed along with its underlying error.
    pub fn preload(&mut self, symbols: &[Symbol]) -> Result<(), StatusError> {
        let mut failures = Vec::new();
        for symbol in symbols {
            if let Err(e) = self.ensure_loaded(symbol) {
                failures.push(format!("{symbol}: {e}"));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(StatusError::internal(format!(
                "preload failed for {} symbol(s): {}",
                failures.len(),
                failures.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btk_core::Price;

    struct FakeSource {
        rows: HashMap<String, Vec<OhlcBar>>,
    }

    impl PriceSource for FakeSource {
        fn load_symbol(&self, symbol: &Symbol) -> Result<Vec<OhlcBar>, StatusError> {
            self.rows
                .get(symbol.as_str())
                .cloned()
                .ok_or_else(|| StatusError::not_found(format!("no rows for {symbol}")))
        }
    }

    fn bar(date: &str, close: f64) -> OhlcBar {
        let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        let p = Price::from_f64(close).unwrap();
        OhlcBar::new("AAPL".into(), d, p, p, p, p, 1000).unwrap()
    }

    #[test]
    fn loads_lazily_and_caches() {
        let mut rows = HashMap::new();
        rows.insert(
            "AAPL".to_string(),
            vec![bar("2024-01-02", 100.0), bar("2024-01-03", 101.0)],
        );
        let mut archive = PriceArchive::new(FakeSource { rows });
        let symbol: Symbol = "AAPL".into();
        let out = archive
            .get_prices(
                &symbol,
                NaiveDate::parse_from_str("2024-01-01", "%Y-%m-%d").unwrap(),
                NaiveDate::parse_from_str("2024-01-31", "%Y-%m-%d").unwrap(),
            )
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn rejects_reversed_range() {
        let mut archive = PriceArchive::new(FakeSource {
            rows: HashMap::new(),
        });
        let err = archive
            .get_prices(
                &"AAPL".into(),
                NaiveDate::parse_from_str("2024-02-01", "%Y-%m-%d").unwrap(),
                NaiveDate::parse_from_str("2024-01-01", "%Y-%m-%d").unwrap(),
            )
            .unwrap_err();
        assert_eq!(err.code, btk_core::StatusCode::InvalidArgument);
    }

    #[test]
    fn unknown_symbol_is_not_found() {
        let mut archive = PriceArchive::new(FakeSource {
            rows: HashMap::new(),
        });
        let err = archive
            .get_prices(
                &"ZZZZ".into(),
                NaiveDate::parse_from_str("2024-01-01", "%Y-%m-%d").unwrap(),
                NaiveDate::parse_from_str("2024-01-31", "%Y-%m-%d").unwrap(),
            )
            .unwrap_err();
        assert_eq!(err.code, btk_core::StatusCode::NotFound);
    }

    #[test]
    fn preload_aggregates_failures() {
        let mut rows = HashMap::new();
        rows.insert("AAPL".to_string(), vec![bar("2024-01-02", 100.0)]);
        let mut archive = PriceArchive::new(FakeSource { rows });
        let err = archive
            .preload(&["AAPL".into(), "MSFT".into(), "GOOG".into()])
            .unwrap_err();
        assert!(err.message.contains("MSFT"));
        assert!(err.message.contains("GOOG"));
    }
}
