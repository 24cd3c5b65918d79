//! Write batches carried by a `BatchSink`

use crate::model::{Candle, FeatureRow, ShapeVector, Window};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Embedding plus the scalar fields a vector index filters on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub window_id: String,
    pub embedding: ShapeVector,
    pub symbol: String,
    pub timeframe: String,
    pub t_end: DateTime<Utc>,
    pub vol_bucket: i32,
    pub trend_bucket: i32,
    pub feature_version: u32,
}

impl VectorRecord {
    pub fn new(window: &Window, row: &FeatureRow, embedding: ShapeVector) -> Self {
        Self {
            window_id: window.window_id.clone(),
            embedding,
            symbol: window.symbol.clone(),
            timeframe: window.timeframe.clone(),
            t_end: window.t_end,
            vol_bucket: row.vol_bucket,
            trend_bucket: row.trend_bucket,
            feature_version: row.feature_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriteBatch {
    Candles {
        candles: Vec<Candle>,
    },
    Windows {
        windows: Vec<Window>,
        features: Vec<FeatureRow>,
    },
    Vectors {
        vectors: Vec<VectorRecord>,
    },
}

impl WriteBatch {
    /// Short name, also used as the JSONL file stem
    pub fn kind(&self) -> &'static str {
        match self {
            WriteBatch::Candles { .. } => "candles",
            WriteBatch::Windows { .. } => "windows",
            WriteBatch::Vectors { .. } => "vectors",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            WriteBatch::Candles { candles } => candles.len(),
            WriteBatch::Windows { windows, .. } => windows.len(),
            WriteBatch::Vectors { vectors } => vectors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
