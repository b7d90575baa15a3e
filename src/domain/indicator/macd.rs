//! MACD (Moving Average Convergence Divergence).
//!
//! MACD line = EMA(fast) - EMA(slow)
//! Signal line = EMA(signal) of the MACD line, seeded once the line is defined
//! Histogram = MACD line - signal line
//!
//! Default parameters: fast=12, slow=26, signal=9.

use super::ema::{ema, ema_of};
use super::{Column, IndicatorOutput, IndicatorParams, source_values};
use crate::domain::error::ConfigurationError;
use crate::domain::ohlcv::PriceBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub const COMPONENTS: &[&str] = &["macd", "signal", "histogram"];

pub struct MacdColumns {
    pub line: Column,
    pub signal: Column,
    pub histogram: Column,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdColumns {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);

    let line: Column = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema_of(&line, signal_period);
    let histogram = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| Some((*l)? - (*s)?))
        .collect();

    MacdColumns {
        line,
        signal,
        histogram,
    }
}

pub fn compute(
    bars: &[PriceBar],
    params: &IndicatorParams,
) -> Result<IndicatorOutput, ConfigurationError> {
    let fast = params.period("fast", DEFAULT_FAST)?;
    let slow = params.period("slow", DEFAULT_SLOW)?;
    let signal = params.period("signal", DEFAULT_SIGNAL)?;
    let values = source_values(bars, params.source());
    let cols = macd(&values, fast, slow, signal);
    Ok(IndicatorOutput {
        components: vec![
            ("macd", cols.line),
            ("signal", cols.signal),
            ("histogram", cols.histogram),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::defined;
    use approx::assert_relative_eq;

    #[test]
    fn macd_warmup_lengths() {
        let values: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let cols = macd(&values, 12, 26, 9);
        // line defined from index 25, signal from 25 + 8
        assert_eq!(cols.line[24], None);
        assert!(cols.line[25].is_some());
        assert_eq!(cols.signal[32], None);
        assert!(cols.signal[33].is_some());
        assert_eq!(defined(&cols.histogram), 50 - 33);
    }

    #[test]
    fn macd_constant_series_is_zero() {
        let values = vec![42.0; 40];
        let cols = macd(&values, 3, 6, 3);
        for v in cols.line.iter().flatten() {
            assert_relative_eq!(*v, 0.0);
        }
        for v in cols.histogram.iter().flatten() {
            assert_relative_eq!(*v, 0.0);
        }
    }

    #[test]
    fn macd_rising_series_has_positive_line() {
        let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let cols = macd(&values, 3, 6, 3);
        assert!(cols.line.iter().flatten().all(|v| *v > 0.0));
    }

    #[test]
    fn histogram_is_line_minus_signal() {
        let values: Vec<f64> = (0..40).map(|i| ((i as f64) * 0.7).sin() * 10.0 + 50.0).collect();
        let cols = macd(&values, 3, 6, 4);
        for i in 0..values.len() {
            if let (Some(l), Some(s), Some(h)) = (cols.line[i], cols.signal[i], cols.histogram[i]) {
                assert_relative_eq!(h, l - s, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn compute_emits_three_components() {
        let bars = crate::domain::indicator::test_support::bars_from_closes(&[1.0; 10]);
        let params = IndicatorParams::new("m")
            .with("fast", 2.0)
            .with("slow", 3.0)
            .with("signal", 2.0);
        let out = compute(&bars, &params).unwrap();
        let names: Vec<&str> = out.components.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, COMPONENTS);
    }
}
