//! Symbols and daily OHLC bars (spec §3).

use std::fmt;

use chrono::NaiveDate;

use crate::price::Price;
use crate::status::StatusError;

/// An equity ticker symbol. A thin newtype so call sites never confuse a
/// symbol with an arbitrary `String`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One (open, high, low, close, volume) record for a symbol on one trading
/// day.
///
/// Invariant: `low <= min(open, close) <= max(open, close) <= high`,
/// `low > 0`. Enforced at construction time by [`OhlcBar::new`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OhlcBar {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: i64,
}

impl OhlcBar {
    pub fn new(
        symbol: Symbol,
        date: NaiveDate,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: i64,
    ) -> Result<Self, StatusError> {
        if low.micros() <= 0 {
            return Err(StatusError::invalid_argument(format!(
                "bar for {symbol} on {date}: low must be > 0, got {low}"
            )));
        }
        let body_lo = open.min(close);
        let body_hi = open.max(close);
        if !(low <= body_lo && body_hi <= high) {
            return Err(StatusError::invalid_argument(format!(
                "bar for {symbol} on {date}: violates low <= min(open,close) <= max(open,close) <= high \
                 (open={open}, high={high}, low={low}, close={close})"
            )));
        }
        Ok(Self {
            symbol,
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// `true` when open == close (a "neutral" bar, per the path-generation
    /// direction inference in spec §4.5).
    pub fn is_neutral(&self) -> bool {
        self.open == self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(v: f64) -> Price {
        Price::from_f64(v).unwrap()
    }

    fn date(d: &str) -> NaiveDate {
        NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn accepts_valid_bar() {
        let bar = OhlcBar::new(
            "AAPL".into(),
            date("2024-01-02"),
            px(100.0),
            px(105.0),
            px(95.0),
            px(102.0),
            1_000_000,
        );
        assert!(bar.is_ok());
    }

    #[test]
    fn rejects_high_below_body() {
        let bar = OhlcBar::new(
            "AAPL".into(),
            date("2024-01-02"),
            px(100.0),
            px(101.0),
            px(95.0),
            px(102.0), // close above high
            1_000_000,
        );
        assert!(bar.is_err());
    }

    #[test]
    fn rejects_low_above_body() {
        let bar = OhlcBar::new(
            "AAPL".into(),
            date("2024-01-02"),
            px(100.0),
            px(105.0),
            px(99.0), // low above open
            px(98.0),
            1_000_000,
        );
        assert!(bar.is_err());
    }

    #[test]
    fn is_neutral_when_open_equals_close() {
        let bar = OhlcBar::new(
            "AAPL".into(),
            date("2024-01-02"),
            px(100.0),
            px(101.0),
            px(99.0),
            px(100.0),
            500,
        )
        .unwrap();
        assert!(bar.is_neutral());
    }
}
