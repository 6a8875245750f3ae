//! The price-source collaborator contract (§6's "external CSV collaborator").
//!
//! [`PriceArchive`] loads through an injected [`PriceSource`]; the archive
//! itself owns lazy loading and the symbol-granularity cache, while a source
//! owns the mechanics of getting rows from wherever they live.

use btk_core::{OhlcBar, StatusError, Symbol};

/// Supplies the full ascending, duplicate-free row series for one symbol.
/// Implementations must reject unsorted or duplicate-date input themselves —
/// [`PriceArchive`](crate::PriceArchive) trusts what it gets back.
pub trait PriceSource {
    fn load_symbol(&self, symbol: &Symbol) -> Result<Vec<OhlcBar>, StatusError>;
}
