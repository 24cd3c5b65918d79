//! Sliding-window candle analytics
//!
//! A candle stream is cut into fixed-length windows, each window is reduced
//! to scalar features and a shape vector, historical windows are scored by
//! what happened after them, and similarity hits are reranked by recency.
//!
//! ```text
//! Candle ─→ WindowBuilder ─→ Window ─→ FeatureExtractor ─→ FeatureRow + ShapeVector
//!                                 │                              │
//!                                 └→ OutcomeEngine          SimilarityIndex ─→ Reranker
//! ```
//!
//! Storage, vector search and messaging are collaborators behind the traits
//! in [`store`]. The library logs through the `log` facade and never installs
//! a logger itself.

pub mod config;
pub mod feature;
pub mod model;
pub mod outcome;
pub mod pipeline;
pub mod rerank;
pub mod store;
pub mod window;

pub use config::{ConfigError, EngineConfig};
pub use feature::{ExtractedFeatures, ExtractorConfig, FeatureExtractor};
pub use model::{Candle, FeatureRow, ShapeVector, Window};
pub use outcome::{aggregate_outcomes, AggregatedOutcome, Outcome, OutcomeConfig, OutcomeEngine};
pub use pipeline::{PipelineSummary, WindowPipeline};
pub use rerank::{search_similar, RankedResult, Reranker, TimeDecayConfig};
pub use store::{BatchSink, CandleStore, SearchResult, SimilarityIndex, StoreError, WindowStore};
pub use window::{BuilderConfig, CircularCandleBuffer, WindowBuilder};
