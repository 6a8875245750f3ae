//! Pure indicator computation and the cadence-/provisional-aware cache that
//! sits in front of it.

mod cache;
mod compute;
mod spec;

pub use cache::{CachedValue, IndicatorCache};
pub use compute::{compute, IndicatorError, IndicatorPoint};
pub use spec::{IndicatorKind, IndicatorSpec};
