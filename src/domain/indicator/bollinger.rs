//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: middle + k * stddev
//! - Lower: middle - k * stddev
//!
//! stddev is the sample standard deviation. Defaults: length=20, std=2.

use super::sma::sma;
use super::stddev::rolling_stddev;
use super::{Column, IndicatorOutput, IndicatorParams, source_values};
use crate::domain::error::ConfigurationError;
use crate::domain::ohlcv::PriceBar;

pub const COMPONENTS: &[&str] = &["middle", "upper", "lower"];

pub struct BollingerColumns {
    pub middle: Column,
    pub upper: Column,
    pub lower: Column,
}

pub fn bollinger(values: &[f64], period: usize, k: f64) -> BollingerColumns {
    let middle = sma(values, period);
    let sd = rolling_stddev(values, period);
    let band = |sign: f64| -> Column {
        middle
            .iter()
            .zip(&sd)
            .map(|(m, s)| Some((*m)? + sign * k * (*s)?))
            .collect()
    };
    let upper = band(1.0);
    let lower = band(-1.0);
    BollingerColumns {
        middle,
        upper,
        lower,
    }
}

pub fn compute(
    bars: &[PriceBar],
    params: &IndicatorParams,
) -> Result<IndicatorOutput, ConfigurationError> {
    let period = params.period("length", 20)?;
    if period < 2 {
        return Err(params.invalid("length", "needs at least 2 values".into()));
    }
    let k = params.number("std", 2.0);
    if !k.is_finite() || k < 0.0 {
        return Err(params.invalid("std", format!("must be non-negative, got {k}")));
    }
    let values = source_values(bars, params.source());
    let cols = bollinger(&values, period, k);
    Ok(IndicatorOutput {
        components: vec![
            ("middle", cols.middle),
            ("upper", cols.upper),
            ("lower", cols.lower),
        ],
    })
}
