//! Feature extraction
//!
//! ```text
//! complete Window → FeatureExtractor ─┬→ FeatureRow   (trend, volatility, drawdown, ATR, volume z)
//!                        │            └→ ShapeVector  (returns | ranges | upper | lower wicks)
//!                        └── normalize (z-score + clip, min-max, downsample)
//! ```

pub mod extract;
pub mod normalize;

pub use extract::{ExtractedFeatures, ExtractorConfig, FeatureExtractor};
