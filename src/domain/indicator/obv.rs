//! OBV (On-Balance Volume).

use super::{Column, IndicatorOutput, IndicatorParams};
use crate::domain::error::ConfigurationError;
use crate::domain::ohlcv::PriceBar;

/// OBV[0] = 0
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// Otherwise OBV[i] = OBV[i-1]
///
/// No warmup; every bar is defined.
pub fn obv(bars: &[PriceBar]) -> Column {
    let mut out = Vec::with_capacity(bars.len());
    let mut total = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev_close = bars[i - 1].close;
            if bar.close > prev_close {
                total += bar.volume;
            } else if bar.close < prev_close {
                total -= bar.volume;
            }
        }
        out.push(Some(total));
    }
    out
}

pub fn compute(
    bars: &[PriceBar],
    _params: &IndicatorParams,
) -> Result<IndicatorOutput, ConfigurationError> {
    Ok(IndicatorOutput::single(obv(bars)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::bars_from_closes;

    #[test]
    fn obv_accumulates_signed_volume() {
        let mut bars = bars_from_closes(&[10.0, 11.0, 11.0, 9.0]);
        bars[1].volume = 50.0;
        bars[3].volume = 30.0;
        let out = obv(&bars);
        assert_eq!(out, vec![Some(0.0), Some(50.0), Some(50.0), Some(20.0)]);
    }

    #[test]
    fn obv_empty() {
        assert!(obv(&[]).is_empty());
    }
}
