//! Price archive (lazy per-symbol load + cache) and cadence conversion.

mod archive;
mod cadence;
mod csv_source;
mod source;

pub use archive::PriceArchive;
pub use cadence::{convert, Cadence, CadenceBar};
pub use csv_source::{write_symbol_csv, CsvPriceSource};
pub use source::PriceSource;
