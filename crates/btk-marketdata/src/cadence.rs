//! Daily → weekly/monthly aggregation with provisional-tail handling (§4.2).

use btk_core::{OhlcBar, StatusError};
use chrono::{Datelike, NaiveDate};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

/// One aggregated bar plus whether it represents a complete period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CadenceBar {
    pub bar: OhlcBar,
    /// `true` when this bar was built from an incomplete trailing period
    /// (the current week/month hasn't ended yet as of `as_of_date`).
    pub provisional: bool,
}

/// Aggregates `prices` (must already be ascending, unique, and produced for a
/// single symbol) to `cadence`.
///
/// - `as_of_date`: when `Some`, an incomplete trailing period is emitted as a
///   provisional bar dated to the last observed day in that period. When
///   `None`, an incomplete tail is dropped unless `include_partial_week` is
///   set.
/// - `weekday_only`: reject any input row falling on a Saturday/Sunday.
pub fn convert(
    prices: &[OhlcBar],
    cadence: Cadence,
    as_of_date: Option<NaiveDate>,
    include_partial_week: bool,
    weekday_only: bool,
) -> Result<Vec<CadenceBar>, StatusError> {
    validate_ascending_unique(prices)?;
    if weekday_only {
        if let Some(bar) = prices.iter().find(|b| is_weekend(b.date)) {
            return Err(StatusError::invalid_argument(format!(
                "weekday-only mode rejects weekend row for '{}' on {}",
                bar.symbol, bar.date
            )));
        }
    }

    match cadence {
        Cadence::Daily => Ok(prices
            .iter()
            .cloned()
            .map(|bar| CadenceBar {
                bar,
                provisional: false,
            })
            .collect()),
        Cadence::Weekly => Ok(aggregate(
            prices,
            as_of_date,
            include_partial_week,
            |d| {
                let iso = d.iso_week();
                (iso.year(), iso.week())
            },
            |last_date| last_date.week(chrono::Weekday::Mon).last_day(),
        )),
        Cadence::Monthly => Ok(aggregate(
            prices,
            as_of_date,
            include_partial_week,
            |d| (d.year(), d.month()),
            |last_date| last_month_day(last_date),
        )),
    }
}

fn is_weekend(d: NaiveDate) -> bool {
    matches!(d.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn last_month_day(d: NaiveDate) -> NaiveDate {
    let first_of_next = if d.month() == 12 {
        NaiveDate::from_ymd_opt(d.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(d.year(), d.month() + 1, 1)
    }
    .expect("valid calendar date");
    first_of_next - chrono::Duration::days(1)
}

fn validate_ascending_unique(prices: &[OhlcBar]) -> Result<(), StatusError> {
    for w in prices.windows(2) {
        if w[1].date <= w[0].date {
            return Err(StatusError::invalid_argument(format!(
                "cadence conversion input is not ascending/unique at {} -> {}",
                w[0].date, w[1].date
            )));
        }
    }
    Ok(())
}

/// Group `prices` by `key_of(date)` (consecutive runs only, since input is
/// already ascending) and aggregate each run into one OHLCV bar.
///
/// `period_last_day(last_row_date)` gives the calendar last day of the period
/// containing a group's final row (Friday of that ISO week, or the month's
/// last calendar day). A trailing group is complete when its last row's date
/// equals that day — or, with `as_of_date` supplied, when `as_of_date` is on
/// or after it (we've observed the world move past the period even if a
/// holiday left the period's own last day without a row). An incomplete
/// trailing group is emitted as provisional when `as_of_date` is present or
/// `include_partial_week` is set, and dropped otherwise.
fn aggregate<K: Eq>(
    prices: &[OhlcBar],
    as_of_date: Option<NaiveDate>,
    include_partial_week: bool,
    key_of: impl Fn(NaiveDate) -> K,
    period_last_day: impl Fn(NaiveDate) -> NaiveDate,
) -> Vec<CadenceBar> {
    if prices.is_empty() {
        return Vec::new();
    }

    let mut groups: Vec<Vec<&OhlcBar>> = Vec::new();
    let mut current_key: Option<K> = None;
    for bar in prices {
        let k = key_of(bar.date);
        match &current_key {
            Some(ck) if *ck == k => groups.last_mut().unwrap().push(bar),
            _ => {
                groups.push(vec![bar]);
                current_key = Some(k);
            }
        }
    }

    let last_idx = groups.len() - 1;
    let mut out = Vec::with_capacity(groups.len());
    for (idx, group) in groups.into_iter().enumerate() {
        let last_row_date = group[group.len() - 1].date;
        let is_complete = if idx != last_idx {
            true
        } else {
            let period_end = period_last_day(last_row_date);
            match as_of_date {
                Some(as_of) => as_of >= period_end,
                None => last_row_date == period_end,
            }
        };

        if !is_complete && as_of_date.is_none() && !include_partial_week {
            continue;
        }
        out.push(fold_group(&group, !is_complete));
    }
    out
}

fn fold_group(group: &[&OhlcBar], provisional: bool) -> CadenceBar {
    let first = group[0];
    let last = group[group.len() - 1];
    let high = group.iter().map(|b| b.high).max().expect("non-empty group");
    let low = group.iter().map(|b| b.low).min().expect("non-empty group");
    let volume: i64 = group.iter().map(|b| b.volume).sum();
    CadenceBar {
        bar: OhlcBar {
            symbol: first.symbol.clone(),
            date: last.date,
            open: first.open,
            high,
            low,
            close: last.close,
            volume,
        },
        provisional,
    }
}
