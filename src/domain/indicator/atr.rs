//! Average True Range: rolling mean of the true range.
//!
//! The first bar has no previous close, so its true range is high - low.

use super::sma::sma;
use super::{Column, IndicatorOutput, IndicatorParams};
use crate::domain::error::ConfigurationError;
use crate::domain::ohlcv::PriceBar;

pub fn true_ranges(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn atr(bars: &[PriceBar], period: usize) -> Column {
    sma(&true_ranges(bars), period)
}

pub fn compute(
    bars: &[PriceBar],
    params: &IndicatorParams,
) -> Result<IndicatorOutput, ConfigurationError> {
    let period = params.period("length", 14)?;
    Ok(IndicatorOutput::single(atr(bars, period)))
}
