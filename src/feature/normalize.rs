//! Numeric transforms over candle series
//!
//! Every function returns a series of the same length as its input (empty in,
//! empty out), except `downsample`, which shrinks to a target length.

use crate::model::Candle;

/// Population mean and standard deviation; `(0, 0)` for empty input
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    (mean, variance.sqrt())
}

/// Z-score, clip to ±`clip_std`, then divide by `clip_std` into [-1, 1].
/// A zero standard deviation is treated as 1. A `clip_std` that is not a
/// positive number yields all zeros.
pub fn zscore_clip(values: &[f64], clip_std: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    if !(clip_std > 0.0) {
        return vec![0.0; values.len()];
    }

    let (mean, std) = mean_std(values);
    let std = if std == 0.0 { 1.0 } else { std };

    values
        .iter()
        .map(|v| {
            let z = ((v - mean) / std).clamp(-clip_std, clip_std);
            z / clip_std
        })
        .collect()
}

pub fn normalize_returns(candles: &[Candle], clip_std: f64) -> Vec<f64> {
    let returns: Vec<f64> = candles.iter().map(Candle::returns).collect();
    zscore_clip(&returns, clip_std)
}

pub fn normalize_ranges(candles: &[Candle], clip_std: f64) -> Vec<f64> {
    let ranges: Vec<f64> = candles.iter().map(Candle::range).collect();
    zscore_clip(&ranges, clip_std)
}

pub fn normalize_volumes(candles: &[Candle], clip_std: f64) -> Vec<f64> {
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    zscore_clip(&volumes, clip_std)
}

/// Upper and lower wick ratios; already within [0, 1]
pub fn normalize_wicks(candles: &[Candle]) -> (Vec<f64>, Vec<f64>) {
    candles
        .iter()
        .map(|c| (c.upper_wick(), c.lower_wick()))
        .unzip()
}

/// Scale into [0, 1]; a zero spread is treated as 1 so every output is 0
pub fn min_max(values: &[f64]) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };

    let (min, max) = values
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let spread = if max - min == 0.0 { 1.0 } else { max - min };

    values.iter().map(|v| (v - min) / spread).collect()
}

/// Average `values` into `target_len` buckets.
///
/// Bucket `i` covers `floor(i * ratio)..ceil((i + 1) * ratio)` with
/// `ratio = len / target_len`, so neighbouring buckets share a boundary sample
/// when the ratio is fractional. Inputs at or below the target come back unchanged.
pub fn downsample(values: &[f64], target_len: usize) -> Vec<f64> {
    if values.len() <= target_len {
        return values.to_vec();
    }
    if target_len == 0 {
        return Vec::new();
    }

    let len = values.len();
    let ratio = len as f64 / target_len as f64;

    (0..target_len)
        .map(|i| {
            let start = (i as f64 * ratio).floor() as usize;
            let end = (((i + 1) as f64 * ratio).ceil() as usize).min(len);
            let bucket = &values[start.min(end)..end];
            if bucket.is_empty() {
                0.0
            } else {
                bucket.iter().sum::<f64>() / bucket.len() as f64
            }
        })
        .collect()
}
