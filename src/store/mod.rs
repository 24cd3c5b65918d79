//! Collaborator contracts and reference adapters
//!
//! The analytics core never talks to a database, vector index or queue
//! directly. It consumes these traits:
//!
//! - `CandleStore` - ordered candles for a (symbol, timeframe, start, end) range
//! - `WindowStore` - window lookup by id
//! - `SimilarityIndex` - TopK nearest-neighbour search with a scalar filter
//! - `BatchSink` - at-least-once delivery of write batches
//!
//! Adapters: `MemoryCandleStore`, `SqliteStore` (rusqlite), `JsonlBatchWriter`
//! and `ChannelSink` (tokio mpsc).

pub mod channel;
pub mod jsonl;
pub mod memory;
pub mod messages;
pub mod sqlite;

use crate::model::{Candle, ShapeVector, Window};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use channel::ChannelSink;
pub use jsonl::JsonlBatchWriter;
pub use memory::MemoryCandleStore;
pub use messages::{VectorRecord, WriteBatch};
pub use sqlite::SqliteStore;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
    /// The receiving side of a channel went away
    Closed,
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Closed => write!(f, "Channel closed"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Range-queryable candle history
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Candles whose open time falls in `[start, end]`, oldest first
    async fn candles_in_range(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, StoreError>;

    /// Most recent `limit` candles, oldest first
    async fn latest_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, StoreError>;
}

/// Window lookup by id
#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn window_by_id(&self, window_id: &str) -> Result<Option<Window>, StoreError>;
}

/// One hit from a similarity search, with the scalar payload stored alongside the vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub window_id: String,
    pub score: f32,
    pub symbol: String,
    pub timeframe: String,
    pub t_end: DateTime<Utc>,
    pub vol_bucket: i32,
    pub trend_bucket: i32,
    pub feature_version: u32,
}

/// Vector index returning up to `top_k` hits ordered by descending similarity
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    async fn search(
        &self,
        query: &ShapeVector,
        filter: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, StoreError>;
}

/// Durable write channel for candles, windows, features and vectors.
///
/// Delivery is at-least-once; window ids are deterministic so replays are idempotent.
#[async_trait]
pub trait BatchSink: Send {
    async fn publish(&mut self, batch: &WriteBatch) -> Result<(), StoreError>;

    /// Flush pending writes to storage
    async fn flush(&mut self) -> Result<(), StoreError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}

/// Scalar filter restricting a search to one symbol/timeframe
pub fn symbol_filter(symbol: &str, timeframe: &str) -> String {
    format!("symbol == \"{}\" && timeframe == \"{}\"", symbol, timeframe)
}
