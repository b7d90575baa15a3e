//! Rolling standard deviation.
//!
//! Sample standard deviation (divides by n-1), so a window of one value is
//! undefined.

use super::Column;

pub fn sample_stddev(window: &[f64]) -> Option<f64> {
    let n = window.len();
    if n < 2 {
        return None;
    }
    let mean = window.iter().sum::<f64>() / n as f64;
    let variance = window
        .iter()
        .map(|x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1) as f64;
    Some(variance.sqrt())
}

pub fn rolling_stddev(values: &[f64], period: usize) -> Column {
    let mut out = vec![None; values.len()];
    if period < 2 {
        return out;
    }
    for i in (period - 1)..values.len() {
        out[i] = sample_stddev(&values[i + 1 - period..=i]);
    }
    out
}
