//! In-memory candle store

use super::{CandleStore, StoreError};
use crate::model::Candle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// Candles held in memory, filtered on every query
#[derive(Debug, Default)]
pub struct MemoryCandleStore {
    candles: RwLock<Vec<Candle>>,
}

impl MemoryCandleStore {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles: RwLock::new(candles),
        }
    }

    pub async fn add_candles(&self, candles: impl IntoIterator<Item = Candle>) {
        self.candles.write().await.extend(candles);
    }

    pub async fn len(&self) -> usize {
        self.candles.read().await.len()
    }
}

fn matches(candle: &Candle, symbol: &str, timeframe: &str) -> bool {
    (symbol.is_empty() || candle.symbol == symbol)
        && (timeframe.is_empty() || candle.timeframe == timeframe)
}

#[async_trait]
impl CandleStore for MemoryCandleStore {
    async fn candles_in_range(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, StoreError> {
        let candles = self.candles.read().await;
        let mut result: Vec<Candle> = candles
            .iter()
            .filter(|c| matches(c, symbol, timeframe))
            .filter(|c| c.open_time >= start && c.open_time <= end)
            .cloned()
            .collect();
        result.sort_by_key(|c| c.open_time);
        Ok(result)
    }

    async fn latest_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, StoreError> {
        let candles = self.candles.read().await;
        let mut filtered: Vec<Candle> = candles
            .iter()
            .filter(|c| matches(c, symbol, timeframe))
            .cloned()
            .collect();
        filtered.sort_by_key(|c| c.open_time);

        let skip = filtered.len().saturating_sub(limit);
        Ok(filtered.split_off(skip))
    }
}
