//! Feature rows and shape vectors from complete windows

use super::normalize::{
    downsample, mean_std, normalize_ranges, normalize_returns, normalize_wicks,
};
use crate::config::ConfigError;
use crate::model::feature::VECTOR_DIM_96;
use crate::model::{
    classify_trend_bucket, classify_vol_bucket, Candle, FeatureRow, ShapeVector, Window,
};

/// Number of per-candle series concatenated into a shape vector
const SHAPE_FIELDS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    pub feature_version: u32,
    /// Shape vector length (96 or 128 in practice)
    pub vector_dim: usize,
    /// Clip bound for z-scored series, in standard deviations
    pub clip_std: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            feature_version: 1,
            vector_dim: VECTOR_DIM_96,
            clip_std: 3.0,
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vector_dim < SHAPE_FIELDS {
            return Err(ConfigError::InvalidValue(format!(
                "vector dimension must be at least {}, got {}",
                SHAPE_FIELDS, self.vector_dim
            )));
        }
        if !(self.clip_std > 0.0) || !self.clip_std.is_finite() {
            return Err(ConfigError::InvalidValue(format!(
                "clip_std must be a positive number, got {}",
                self.clip_std
            )));
        }
        Ok(())
    }
}

/// Feature row and shape vector for one window
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFeatures {
    pub row: FeatureRow,
    pub vector: ShapeVector,
}

pub struct FeatureExtractor {
    config: ExtractorConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Features for a complete window; `None` for an incomplete one
    pub fn extract(&self, window: &Window) -> Option<ExtractedFeatures> {
        if !window.is_complete() {
            return None;
        }

        let candles = &window.candles;
        let trend_slope = trend_slope(candles);
        let vol_z_score = volume_zscore(candles);

        let row = FeatureRow {
            window_id: window.window_id.clone(),
            trend_slope,
            realized_volatility: realized_volatility(candles),
            max_drawdown: max_drawdown(candles),
            atr: average_true_range(candles),
            vol_z_score,
            vol_bucket: classify_vol_bucket(vol_z_score),
            trend_bucket: classify_trend_bucket(trend_slope),
            feature_version: self.config.feature_version,
        };

        Some(ExtractedFeatures {
            row,
            vector: self.shape_vector(candles),
        })
    }

    /// Extract every complete window, in input order, skipping incomplete ones
    pub fn extract_batch(&self, windows: &[Window]) -> Vec<(String, ExtractedFeatures)> {
        windows
            .iter()
            .filter_map(|w| {
                let features = self.extract(w);
                if features.is_none() {
                    log::debug!("Skipping incomplete window {}", w.window_id);
                }
                features.map(|f| (w.window_id.clone(), f))
            })
            .collect()
    }

    /// Concatenate down-sampled returns, ranges, upper wicks and lower wicks.
    /// Each field gets `vector_dim / 4` slots (fewer if the window is shorter);
    /// unused trailing slots stay zero.
    fn shape_vector(&self, candles: &[Candle]) -> ShapeVector {
        let dim = self.config.vector_dim;
        let clip_std = self.config.clip_std;
        let samples = (dim / SHAPE_FIELDS).min(candles.len());

        let (upper, lower) = normalize_wicks(candles);
        let fields = [
            normalize_returns(candles, clip_std),
            normalize_ranges(candles, clip_std),
            upper,
            lower,
        ];

        let mut vector = ShapeVector::zeros(dim);
        let mut idx = 0;
        for field in fields.iter() {
            let sampled = downsample(field, samples);
            for i in 0..samples {
                if idx >= dim {
                    break;
                }
                if let Some(&v) = sampled.get(i) {
                    vector.0[idx] = v as f32;
                }
                idx += 1;
            }
        }

        vector
    }
}

/// OLS slope of `(i, (close_i - close_0) / close_0)`
pub fn trend_slope(candles: &[Candle]) -> f64 {
    if candles.len() < 2 {
        return 0.0;
    }
    let base = candles[0].close;
    if base == 0.0 {
        return 0.0;
    }

    let n = candles.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, c) in candles.iter().enumerate() {
        let x = i as f64;
        let y = (c.close - base) / base;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denominator
}

/// Std-dev of close-to-close returns (a zero previous close contributes 0)
pub fn realized_volatility(candles: &[Candle]) -> f64 {
    if candles.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = candles
        .windows(2)
        .map(|pair| {
            let prev = pair[0].close;
            if prev == 0.0 {
                0.0
            } else {
                (pair[1].close - prev) / prev
            }
        })
        .collect();

    mean_std(&returns).1
}

/// Largest fractional decline of close from its running peak
pub fn max_drawdown(candles: &[Candle]) -> f64 {
    if candles.len() < 2 {
        return 0.0;
    }

    let mut peak = candles[0].close;
    let mut max_dd: f64 = 0.0;
    for c in candles {
        peak = peak.max(c.close);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - c.close) / peak);
        }
    }
    max_dd
}

/// Mean true range over candles 1.., divided by the first close
pub fn average_true_range(candles: &[Candle]) -> f64 {
    if candles.len() < 2 {
        return 0.0;
    }
    let base = candles[0].close;
    if base == 0.0 {
        return 0.0;
    }

    let sum_tr: f64 = candles
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            (curr.high - curr.low)
                .max((curr.high - prev.close).abs())
                .max((curr.low - prev.close).abs())
        })
        .sum();

    sum_tr / (candles.len() - 1) as f64 / base
}

/// Z-score of the last candle's volume against the window; 0 when flat
pub fn volume_zscore(candles: &[Candle]) -> f64 {
    if candles.len() < 2 {
        return 0.0;
    }

    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let (mean, std) = mean_std(&volumes);
    if std == 0.0 {
        return 0.0;
    }

    let last = volumes[volumes.len() - 1];
    (last - mean) / std
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::candle::test_support::{candle_at, close_at};
    use crate::model::feature::{TREND_NEUTRAL, TREND_STRONG_UP};

    fn window_of(candles: Vec<Candle>, w: usize) -> Window {
        let t_end = candles.last().map(|c| c.close_time).unwrap();
        Window::new("BTCUSDT", "1m", t_end, w, 1, candles)
    }

    fn extractor(dim: usize) -> FeatureExtractor {
        FeatureExtractor::new(ExtractorConfig {
            vector_dim: dim,
            ..ExtractorConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_trend_slope_linear_series() {
        // Closes 100, 101, 102, ... -> y = 0.01 * i exactly
        let candles: Vec<_> = (0..10).map(|i| close_at(i, 100.0 + i as f64)).collect();
        assert!((trend_slope(&candles) - 0.01).abs() < 1e-12);
        assert_eq!(trend_slope(&candles[..1]), 0.0);
        assert_eq!(trend_slope(&[close_at(0, 0.0), close_at(1, 5.0)]), 0.0);
    }

    #[test]
    fn test_realized_volatility() {
        // Returns alternate +10% / -10% around mean 0
        let candles = vec![
            close_at(0, 100.0),
            close_at(1, 110.0),
            close_at(2, 99.0),
        ];
        let rv = realized_volatility(&candles);
        assert!((rv - 0.1).abs() < 1e-12, "rv={}", rv);
        assert_eq!(realized_volatility(&candles[..1]), 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        let candles: Vec<_> = [100.0, 120.0, 90.0, 110.0, 60.0, 130.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| close_at(i as i64, c))
            .collect();
        assert!((max_drawdown(&candles) - 0.5).abs() < 1e-12);

        let rising: Vec<_> = (0..5).map(|i| close_at(i, 1.0 + i as f64)).collect();
        assert_eq!(max_drawdown(&rising), 0.0);
    }

    #[test]
    fn test_average_true_range_uses_previous_close() {
        let candles = vec![
            candle_at(0, 100.0, 101.0, 99.0, 100.0, 1.0),
            // Gap up: |high - prev_close| = 10 dominates high-low = 2
            candle_at(1, 108.0, 110.0, 108.0, 109.0, 1.0),
            candle_at(2, 109.0, 111.0, 107.0, 110.0, 1.0),
        ];
        // TRs: 10, 4 -> mean 7 -> / 100
        assert!((average_true_range(&candles) - 0.07).abs() < 1e-12);
    }

    #[test]
    fn test_volume_zscore() {
        let mut candles: Vec<_> = (0..4).map(|i| candle_at(i, 1.0, 1.0, 1.0, 1.0, 10.0)).collect();
        assert_eq!(volume_zscore(&candles), 0.0);

        candles.push(candle_at(4, 1.0, 1.0, 1.0, 1.0, 20.0));
        // mean 12, std 4 -> (20 - 12) / 4
        assert!((volume_zscore(&candles) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_extract_complete_window() {
        let candles: Vec<_> = (0..8)
            .map(|i| {
                let open = 100.0 + 5.0 * i as f64;
                candle_at(i, open, open + 6.0, open - 1.0, open + 5.0, 10.0 + i as f64)
            })
            .collect();
        let window = window_of(candles, 8);

        let features = extractor(96).extract(&window).unwrap();
        assert_eq!(features.row.window_id, window.window_id);
        assert_eq!(features.row.feature_version, 1);
        assert_eq!(features.row.trend_bucket, TREND_STRONG_UP);
        assert_eq!(features.row.max_drawdown, 0.0);
        assert!(features.row.vol_z_score > 0.0);
        assert!((0..=9).contains(&features.row.vol_bucket));
        assert_eq!(features.vector.dim(), 96);
    }

    #[test]
    fn test_incomplete_window_yields_nothing() {
        let candles: Vec<_> = (0..3).map(|i| close_at(i, 100.0)).collect();
        let window = window_of(candles, 5);
        assert!(extractor(96).extract(&window).is_none());
    }

    #[test]
    fn test_shape_vector_layout_short_window() {
        // 4 candles, dim 96: each field takes 4 slots, the rest stays zero.
        let candles = vec![
            candle_at(0, 100.0, 104.0, 96.0, 102.0, 1.0),
            candle_at(1, 102.0, 103.0, 100.0, 101.0, 1.0),
            candle_at(2, 101.0, 106.0, 101.0, 105.0, 1.0),
            candle_at(3, 105.0, 105.0, 95.0, 96.0, 1.0),
        ];
        let window = window_of(candles.clone(), 4);
        let vector = extractor(96).extract(&window).unwrap().vector;

        let (upper, lower) = normalize_wicks(&candles);
        for i in 0..4 {
            assert_eq!(vector.0[8 + i], upper[i] as f32);
            assert_eq!(vector.0[12 + i], lower[i] as f32);
        }
        assert!(vector.0[16..].iter().all(|&v| v == 0.0));
        assert!(vector.0[..8].iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_shape_vector_long_window_downsampled() {
        let candles: Vec<_> = (0..60)
            .map(|i| {
                let open = 100.0 + (i as f64 * 0.7).sin();
                candle_at(i, open, open + 1.0, open - 1.0, open + 0.5, 5.0)
            })
            .collect();
        let window = window_of(candles, 60);
        let vector = extractor(128).extract(&window).unwrap().vector;
        assert_eq!(vector.dim(), 128);
        // Every upper wick is (1.0 - 0.5) / 2.0
        assert!(vector.0[64..96].iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_flat_window_is_neutral() {
        let candles: Vec<_> = (0..6).map(|i| close_at(i, 50.0)).collect();
        let row = extractor(96).extract(&window_of(candles, 6)).unwrap().row;
        assert_eq!(row.trend_slope, 0.0);
        assert_eq!(row.trend_bucket, TREND_NEUTRAL);
        assert_eq!(row.atr, 0.0);
        assert_eq!(row.vol_z_score, 0.0);
        assert_eq!(row.vol_bucket, 5);
    }

    #[test]
    fn test_extract_batch_skips_incomplete() {
        let full = window_of((0..4).map(|i| close_at(i, 10.0)).collect(), 4);
        let partial = window_of((0..2).map(|i| close_at(i, 10.0)).collect(), 4);
        let out = extractor(96).extract_batch(&[partial, full.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, full.window_id);
    }

    #[test]
    fn test_invalid_extractor_config() {
        assert!(FeatureExtractor::new(ExtractorConfig {
            vector_dim: 3,
            ..ExtractorConfig::default()
        })
        .is_err());
        assert!(FeatureExtractor::new(ExtractorConfig {
            clip_std: 0.0,
            ..ExtractorConfig::default()
        })
        .is_err());
    }
}
