//! Market data access port.

use chrono::NaiveDate;

use crate::domain::error::TrendsimError;
use crate::domain::price_bar::{PriceBar, Timeframe};

/// Source of historical bars.
///
/// `get_bars` returns bars dated within `[start, end]` inclusive, ascending
/// by timestamp with no duplicates. An unknown symbol is
/// [`TrendsimError::SymbolNotFound`]; a known symbol with nothing in the
/// window is an empty `Vec`.
pub trait MarketDataPort {
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, TrendsimError>;

    fn list_symbols(&self) -> Result<Vec<String>, TrendsimError>;
}
