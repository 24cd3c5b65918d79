//! Fixed-length candle window with a content-addressed identity

use super::candle::Candle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a window id (32 hex chars)
const WINDOW_ID_BYTES: usize = 16;

/// Ordered run of `w` candles for one symbol/timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub window_id: String,
    pub symbol: String,
    pub timeframe: String,
    pub t_end: DateTime<Utc>,
    pub w: usize,
    pub feature_version: u32,
    pub candles: Vec<Candle>,
    pub created_at: DateTime<Utc>,
}

/// Deterministic id: `sha256(symbol|timeframe|t_end_unix|w|feature_version)`,
/// truncated to 16 bytes and hex-encoded.
///
/// Candle contents do not participate, so rebuilding a window from the same
/// stream position always yields the same id and downstream writes stay idempotent.
pub fn generate_window_id(
    symbol: &str,
    timeframe: &str,
    t_end: DateTime<Utc>,
    w: usize,
    feature_version: u32,
) -> String {
    let key = format!(
        "{}|{}|{}|{}|{}",
        symbol,
        timeframe,
        t_end.timestamp(),
        w,
        feature_version
    );
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..WINDOW_ID_BYTES])
}

impl Window {
    pub fn new(
        symbol: &str,
        timeframe: &str,
        t_end: DateTime<Utc>,
        w: usize,
        feature_version: u32,
        candles: Vec<Candle>,
    ) -> Self {
        Self {
            window_id: generate_window_id(symbol, timeframe, t_end, w, feature_version),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            t_end,
            w,
            feature_version,
            candles,
            created_at: Utc::now(),
        }
    }

    /// True iff the window holds exactly `w` candles
    pub fn is_complete(&self) -> bool {
        self.candles.len() == self.w
    }

    pub fn first_candle(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last_candle(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Open time of the first candle, if any
    pub fn t_start(&self) -> Option<DateTime<Utc>> {
        self.first_candle().map(|c| c.open_time)
    }
}
