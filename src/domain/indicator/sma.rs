//! Simple Moving Average.
//!
//! SMA(n)[i] = mean of the last n source values. Undefined for i < n-1.

use super::{Column, IndicatorOutput, IndicatorParams, source_values};
use crate::domain::error::ConfigurationError;
use crate::domain::ohlcv::PriceBar;

pub fn sma(values: &[f64], period: usize) -> Column {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

pub fn compute(
    bars: &[PriceBar],
    params: &IndicatorParams,
) -> Result<IndicatorOutput, ConfigurationError> {
    let period = params.period("length", 20)?;
    let values = source_values(bars, params.source());
    Ok(IndicatorOutput::single(sma(&values, period)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sma_basic() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 2.0);
        assert_relative_eq!(out[3].unwrap(), 3.0);
        assert_relative_eq!(out[4].unwrap(), 4.0);
    }

    #[test]
    fn sma_insufficient_history_is_all_undefined() {
        let out = sma(&[1.0, 2.0], 5);
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn sma_period_one_is_identity() {
        let out = sma(&[7.0, 8.0], 1);
        assert_eq!(out, vec![Some(7.0), Some(8.0)]);
    }

    #[test]
    fn compute_reads_source_column() {
        let bars = crate::domain::indicator::test_support::bars_from_closes(&[10.0, 20.0]);
        let params = IndicatorParams::new("hi")
            .with("length", 2.0)
            .with_source(crate::domain::ohlcv::PriceField::High);
        let out = compute(&bars, &params).unwrap();
        assert_relative_eq!(out.primary().unwrap()[1].unwrap(), 16.0);
    }
}
