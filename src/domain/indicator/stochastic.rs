//! Stochastic oscillator.
//!
//! %K = 100 * (close - lowest_low) / (highest_high - lowest_low) over k bars
//! %D = SMA(d) of %K
//!
//! A flat window (highest_high == lowest_low) leaves %K undefined.

use super::{Column, IndicatorOutput, IndicatorParams, rolling_mean};
use crate::domain::error::ConfigurationError;
use crate::domain::ohlcv::PriceBar;

pub const COMPONENTS: &[&str] = &["k", "d"];

pub fn stochastic(bars: &[PriceBar], k_period: usize, d_period: usize) -> (Column, Column) {
    let mut k = vec![None; bars.len()];
    if k_period > 0 {
        for i in (k_period - 1)..bars.len() {
            let window = &bars[i + 1 - k_period..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let range = hh - ll;
            if range > 0.0 {
                k[i] = Some(100.0 * (bars[i].close - ll) / range);
            }
        }
    }
    let d = rolling_mean(&k, d_period);
    (k, d)
}

pub fn compute(
    bars: &[PriceBar],
    params: &IndicatorParams,
) -> Result<IndicatorOutput, ConfigurationError> {
    let k_period = params.period("k", 14)?;
    let d_period = params.period("d", 3)?;
    let (k, d) = stochastic(bars, k_period, d_period);
    Ok(IndicatorOutput {
        components: vec![("k", k), ("d", d)],
    })
}
