//! RSI (Relative Strength Index).
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss); if avg_loss == 0, RSI = 100.
//!
//! Two averaging schemes are offered:
//! - `rsi`: plain mean of gains/losses over the trailing n price changes
//! - `rsi_wilder`: first average is the plain mean, then
//!   avg = (prev_avg * (n-1) + current) / n
//!
//! Both need n price changes, so the first n values are undefined.

use super::{Column, IndicatorOutput, IndicatorParams, source_values};
use crate::domain::error::ConfigurationError;
use crate::domain::ohlcv::PriceBar;

fn changes(values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    values
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip()
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

pub fn rsi(values: &[f64], period: usize) -> Column {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }
    let (gains, losses) = changes(values);
    let mut gain_sum: f64 = gains[..period].iter().sum();
    let mut loss_sum: f64 = losses[..period].iter().sum();
    out[period] = Some(rsi_from_averages(gain_sum / period as f64, loss_sum / period as f64));

    // change j belongs to bar j+1
    for j in period..gains.len() {
        gain_sum += gains[j] - gains[j - period];
        loss_sum += losses[j] - losses[j - period];
        // running sums can drift slightly below zero
        let avg_gain = (gain_sum / period as f64).max(0.0);
        let avg_loss = (loss_sum / period as f64).max(0.0);
        out[j + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }
    out
}

pub fn rsi_wilder(values: &[f64], period: usize) -> Column {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }
    let (gains, losses) = changes(values);
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for j in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[j]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[j]) / period as f64;
        out[j + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }
    out
}

pub fn compute(
    bars: &[PriceBar],
    params: &IndicatorParams,
) -> Result<IndicatorOutput, ConfigurationError> {
    let period = params.period("length", 14)?;
    let values = source_values(bars, params.source());
    Ok(IndicatorOutput::single(rsi(&values, period)))
}

pub fn compute_wilder(
    bars: &[PriceBar],
    params: &IndicatorParams,
) -> Result<IndicatorOutput, ConfigurationError> {
    let period = params.period("length", 14)?;
    let values = source_values(bars, params.source());
    Ok(IndicatorOutput::single(rsi_wilder(&values, period)))
}
