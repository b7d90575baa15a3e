//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = x[i]*k + EMA[i-1]*(1-k). Undefined for the first n-1 values.

use super::{Column, IndicatorOutput, IndicatorParams, source_values};
use crate::domain::error::ConfigurationError;
use crate::domain::ohlcv::PriceBar;

pub fn ema(values: &[f64], period: usize) -> Column {
    let column: Column = values.iter().copied().map(Some).collect();
    ema_of(&column, period)
}

/// EMA over a column that may start with undefined values. Seeding begins
/// at the first defined value; an undefined value after seeding ends the
/// series.
pub fn ema_of(column: &[Option<f64>], period: usize) -> Column {
    let mut out = vec![None; column.len()];
    if period == 0 {
        return out;
    }
    let Some(start) = column.iter().position(Option::is_some) else {
        return out;
    };
    let seed_end = start + period;
    if seed_end > column.len() {
        return out;
    }

    let mut sum = 0.0;
    for v in &column[start..seed_end] {
        match v {
            Some(x) => sum += x,
            None => return out,
        }
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut value = sum / period as f64;
    out[seed_end - 1] = Some(value);
    for i in seed_end..column.len() {
        let Some(x) = column[i] else {
            break;
        };
        value = x * k + value * (1.0 - k);
        out[i] = Some(value);
    }
    out
}

pub fn compute(
    bars: &[PriceBar],
    params: &IndicatorParams,
) -> Result<IndicatorOutput, ConfigurationError> {
    let period = params.period("length", 20)?;
    let values = source_values(bars, params.source());
    Ok(IndicatorOutput::single(ema(&values, period)))
}
