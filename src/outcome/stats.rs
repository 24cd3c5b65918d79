//! Small numeric helpers for forward-return statistics

use crate::model::Candle;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// p-th percentile (p in 0..=100) of an ascending slice, linearly
/// interpolated between the floor and ceil ranks of `p/100 * (n-1)`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                return sorted[lower];
            }
            let fraction = rank - lower as f64;
            sorted[lower] + fraction * (sorted[upper] - sorted[lower])
        }
    }
}

/// Copy of `values` in ascending order; NaNs sort last
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Worst decline from a running peak seeded at `base_price`.
/// The peak follows candle highs, the trough is each candle's low.
pub fn forward_max_drawdown(base_price: f64, candles: &[Candle]) -> f64 {
    if candles.is_empty() || base_price == 0.0 {
        return 0.0;
    }

    let mut peak = base_price;
    let mut max_dd = 0.0_f64;
    for c in candles {
        if c.high > peak {
            peak = c.high;
        }
        let dd = (peak - c.low) / peak;
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}
