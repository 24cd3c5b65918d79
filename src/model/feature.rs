//! Structured features and shape embeddings extracted from a window

use serde::{Deserialize, Serialize};

/// Common embedding dimensions
pub const VECTOR_DIM_96: usize = 96;
pub const VECTOR_DIM_128: usize = 128;

pub const TREND_STRONG_DOWN: i32 = -2;
pub const TREND_DOWN: i32 = -1;
pub const TREND_NEUTRAL: i32 = 0;
pub const TREND_UP: i32 = 1;
pub const TREND_STRONG_UP: i32 = 2;

/// Scalar statistics describing one window, keyed by `window_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub window_id: String,
    /// OLS slope of percentage change from first close vs. candle index
    pub trend_slope: f64,
    /// Std-dev of close-to-close returns
    pub realized_volatility: f64,
    /// Largest peak-to-trough decline of closes
    pub max_drawdown: f64,
    /// Mean true range divided by the first close
    pub atr: f64,
    /// Z-score of the last candle's volume
    pub vol_z_score: f64,
    /// 0..=9
    pub vol_bucket: i32,
    /// -2..=2
    pub trend_bucket: i32,
    pub feature_version: u32,
}

/// Fixed-length f32 embedding used for similarity search
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeVector(pub Vec<f32>);

impl ShapeVector {
    /// Zero-filled vector of `dim` entries
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn to_f64(&self) -> Vec<f64> {
        self.0.iter().map(|&v| v as f64).collect()
    }

    pub fn from_f64(values: &[f64]) -> Self {
        Self(values.iter().map(|&v| v as f32).collect())
    }
}

/// Map a trend slope onto -2..=2 using fixed thresholds
pub fn classify_trend_bucket(slope: f64) -> i32 {
    if slope < -0.02 {
        TREND_STRONG_DOWN
    } else if slope < -0.005 {
        TREND_DOWN
    } else if slope < 0.005 {
        TREND_NEUTRAL
    } else if slope < 0.02 {
        TREND_UP
    } else {
        TREND_STRONG_UP
    }
}

/// Map a volume z-score onto 0..=9: `clamp(round((z + 2) * 2.25), 0, 9)`
pub fn classify_vol_bucket(z_score: f64) -> i32 {
    let bucket = ((z_score + 2.0) * 2.25).round();
    if bucket.is_nan() {
        return 0;
    }
    bucket.clamp(0.0, 9.0) as i32
}
