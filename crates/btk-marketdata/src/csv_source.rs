//! CSV-backed [`PriceSource`] (the archive format of §6): one file per
//! symbol, header `date,open,high,low,close,adjusted_close,volume`, ascending
//! by date, no duplicate dates.

use std::path::{Path, PathBuf};

use btk_core::{OhlcBar, Price, StatusError, Symbol};
use chrono::NaiveDate;

use crate::source::PriceSource;

/// Reads `<symbol>.csv` files out of a directory. Each file must have the
/// header row `date,open,high,low,close,adjusted_close,volume` and rows
/// ascending by date with no duplicates; `adjusted_close` is parsed for
/// contract compliance but not otherwise used (no component in this system
/// consumes it).
pub struct CsvPriceSource {
    directory: PathBuf,
}

impl CsvPriceSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn symbol_path(&self, symbol: &Symbol) -> PathBuf {
        self.directory.join(format!("{}.csv", symbol.as_str()))
    }
}

impl PriceSource for CsvPriceSource {
    fn load_symbol(&self, symbol: &Symbol) -> Result<Vec<OhlcBar>, StatusError> {
        let path = self.symbol_path(symbol);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .map_err(|e| {
                StatusError::not_found(format!(
                    "no archive file for symbol '{symbol}' at {}: {e}",
                    path.display()
                ))
            })?;

        let headers = reader
            .headers()
            .map_err(|e| StatusError::internal(format!("reading header of {}: {e}", path.display())))?
            .clone();
        let col = |name: &str| -> Result<usize, StatusError> {
            headers.iter().position(|h| h.eq_ignore_ascii_case(name)).ok_or_else(|| {
                StatusError::invalid_argument(format!(
                    "{}: missing required column '{name}'",
                    path.display()
                ))
            })
        };
        let idx_date = col("date")?;
        let idx_open = col("open")?;
        let idx_high = col("high")?;
        let idx_low = col("low")?;
        let idx_close = col("close")?;
        let idx_volume = col("volume")?;

        let mut rows = Vec::new();
        let mut last_date: Option<NaiveDate> = None;
        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                StatusError::internal(format!("{}: row {row_idx}: {e}", path.display()))
            })?;
            let field = |idx: usize, name: &str| -> Result<&str, StatusError> {
                record.get(idx).ok_or_else(|| {
                    StatusError::invalid_argument(format!(
                        "{}: row {row_idx}: missing field '{name}'",
                        path.display()
                    ))
                })
            };

            let date_str = field(idx_date, "date")?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                StatusError::invalid_argument(format!(
                    "{}: row {row_idx}: bad date '{date_str}': {e}",
                    path.display()
                ))
            })?;

            if let Some(prev) = last_date {
                if date <= prev {
                    return Err(StatusError::invalid_argument(format!(
                        "{}: row {row_idx}: date {date} is not strictly after previous date {prev} \
                         (archive rows must be ascending with no duplicates)",
                        path.display()
                    )));
                }
            }
            last_date = Some(date);

            let parse_price = |idx: usize, name: &str| -> Result<Price, StatusError> {
                let raw = field(idx, name)?;
                let v: f64 = raw.parse().map_err(|_| {
                    StatusError::invalid_argument(format!(
                        "{}: row {row_idx}: cannot parse {name} '{raw}' as a number",
                        path.display()
                    ))
                })?;
                Price::from_f64(v).map_err(|e| {
                    StatusError::invalid_argument(format!(
                        "{}: row {row_idx}: {name}={raw}: {e}",
                        path.display()
                    ))
                })
            };

            let open = parse_price(idx_open, "open")?;
            let high = parse_price(idx_high, "high")?;
            let low = parse_price(idx_low, "low")?;
            let close = parse_price(idx_close, "close")?;

            let volume_str = field(idx_volume, "volume")?;
            let volume: i64 = volume_str.parse().map_err(|_| {
                StatusError::invalid_argument(format!(
                    "{}: row {row_idx}: cannot parse volume '{volume_str}'",
                    path.display()
                ))
            })?;

            let bar = OhlcBar::new(symbol.clone(), date, open, high, low, close, volume)
                .map_err(|e| StatusError::invalid_argument(format!("{}: row {row_idx}: {e}", path.display())))?;
            rows.push(bar);
        }

        Ok(rows)
    }
}

/// Append-contract writer for the archive format: rejects rows that would
/// make the on-disk series non-ascending or overlapping unless `overwrite`
/// is set, matching §4.1's "writers must reject unsorted inputs and
/// overlapping rewrites unless an explicit override flag is given".
pub fn write_symbol_csv(
    directory: &Path,
    symbol: &Symbol,
    rows: &[OhlcBar],
    overwrite: bool,
) -> Result<(), StatusError> {
    let path = directory.join(format!("{}.csv", symbol.as_str()));
    if path.exists() && !overwrite {
        return Err(StatusError::already_exists(format!(
            "archive file for '{symbol}' already exists at {}; pass overwrite=true to replace",
            path.display()
        )));
    }
    for w in rows.windows(2) {
        if w[1].date <= w[0].date {
            return Err(StatusError::invalid_argument(format!(
                "rows for '{symbol}' are not strictly ascending by date at {} -> {}",
                w[0].date, w[1].date
            )));
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .from_path(&path)
        .map_err(|e| StatusError::internal(format!("opening {}: {e}", path.display())))?;
    writer
        .write_record(["date", "open", "high", "low", "close", "adjusted_close", "volume"])
        .map_err(|e| StatusError::internal(e.to_string()))?;
    for bar in rows {
        writer
            .write_record([
                bar.date.format("%Y-%m-%d").to_string(),
                bar.open.to_f64().to_string(),
                bar.high.to_f64().to_string(),
                bar.low.to_f64().to_string(),
                bar.close.to_f64().to_string(),
                bar.close.to_f64().to_string(),
                bar.volume.to_string(),
            ])
            .map_err(|e| StatusError::internal(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| StatusError::internal(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("btk-marketdata-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_well_formed_archive() {
        let dir = temp_dir();
        let path = dir.join("AAPL.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "date,open,high,low,close,adjusted_close,volume").unwrap();
        writeln!(f, "2024-01-02,100.0,105.0,95.0,102.0,102.0,1000000").unwrap();
        writeln!(f, "2024-01-03,102.0,103.0,100.0,101.0,101.0,900000").unwrap();

        let source = CsvPriceSource::new(&dir);
        let rows = source.load_symbol(&"AAPL".into()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].close.to_f64(), 102.0);
    }

    #[test]
    fn rejects_out_of_order_dates() {
        let dir = temp_dir();
        let path = dir.join("MSFT.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "date,open,high,low,close,adjusted_close,volume").unwrap();
        writeln!(f, "2024-01-03,100.0,105.0,95.0,102.0,102.0,1000000").unwrap();
        writeln!(f, "2024-01-02,102.0,103.0,100.0,101.0,101.0,900000").unwrap();

        let source = CsvPriceSource::new(&dir);
        assert!(source.load_symbol(&"MSFT".into()).is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = temp_dir();
        let source = CsvPriceSource::new(&dir);
        let err = source.load_symbol(&"NOPE".into()).unwrap_err();
        assert_eq!(err.code, btk_core::StatusCode::NotFound);
    }

    #[test]
    fn write_then_read_round_trip() {
        let dir = temp_dir();
        let symbol: Symbol = "RTRP".into();
        let rows = vec![
            OhlcBar::new(
                symbol.clone(),
                NaiveDate::parse_from_str("2024-01-02", "%Y-%m-%d").unwrap(),
                Price::from_f64(10.0).unwrap(),
                Price::from_f64(11.0).unwrap(),
                Price::from_f64(9.0).unwrap(),
                Price::from_f64(10.5).unwrap(),
                500,
            )
            .unwrap(),
        ];
        write_symbol_csv(&dir, &symbol, &rows, true).unwrap();
        let source = CsvPriceSource::new(&dir);
        let loaded = source.load_symbol(&symbol).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].close.to_f64(), 10.5);
    }

    #[test]
    fn write_refuses_overwrite_without_flag() {
        let dir = temp_dir();
        let symbol: Symbol = format!("NOOVW{}", std::process::id()).into();
        let bar = OhlcBar::new(
            symbol.clone(),
            NaiveDate::parse_from_str("2024-01-02", "%Y-%m-%d").unwrap(),
            Price::from_f64(10.0).unwrap(),
            Price::from_f64(11.0).unwrap(),
            Price::from_f64(9.0).unwrap(),
            Price::from_f64(10.5).unwrap(),
            500,
        )
        .unwrap();
        write_symbol_csv(&dir, &symbol, &[bar.clone()], true).unwrap();
        let err = write_symbol_csv(&dir, &symbol, &[bar], false).unwrap_err();
        assert_eq!(err.code, btk_core::StatusCode::AlreadyExists);
    }
}
