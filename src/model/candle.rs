//! OHLCV candle and the per-bar ratios derived from it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar for a symbol/timeframe bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: String,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trades: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vwap: Option<f64>,
}

impl Candle {
    /// Simple return of this bar: `(close - open) / open`
    pub fn returns(&self) -> f64 {
        if self.open == 0.0 {
            return 0.0;
        }
        (self.close - self.open) / self.open
    }

    /// High-low range as a fraction of open
    pub fn range(&self) -> f64 {
        if self.open == 0.0 {
            return 0.0;
        }
        (self.high - self.low) / self.open
    }

    /// Upper wick (high to top of body) as a fraction of the high-low range
    pub fn upper_wick(&self) -> f64 {
        let range = self.high - self.low;
        if range == 0.0 {
            return 0.0;
        }
        let body_top = self.open.max(self.close);
        (self.high - body_top) / range
    }

    /// Lower wick (bottom of body to low) as a fraction of the high-low range
    pub fn lower_wick(&self) -> f64 {
        let range = self.high - self.low;
        if range == 0.0 {
            return 0.0;
        }
        let body_bottom = self.open.min(self.close);
        (body_bottom - self.low) / range
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}
