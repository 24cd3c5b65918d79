//! Core value types: candles, windows, feature rows and shape vectors

pub mod candle;
pub mod feature;
pub mod window;

pub use candle::Candle;
pub use feature::{classify_trend_bucket, classify_vol_bucket, FeatureRow, ShapeVector};
pub use window::{generate_window_id, Window};
