//! Price bar source port trait.

use crate::domain::error::OptraderError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// Bars for `symbol` in source order, limited to `[start, end]` when
    /// bounds are given.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<PriceBar>, OptraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, OptraderError>;

    /// First timestamp, last timestamp and bar count.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, OptraderError>;
}
