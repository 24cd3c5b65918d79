//! SQLite-backed candle, window, feature and outcome storage
//!
//! All writes are upserts on natural keys (`(symbol, timeframe, open_time)`,
//! `window_id`, `(window_id, horizon)`), so replaying a batch is harmless.

use super::messages::WriteBatch;
use super::{BatchSink, CandleStore, StoreError, WindowStore};
use crate::model::{Candle, FeatureRow, Window};
use crate::outcome::Outcome;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS candles (
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    open_time INTEGER NOT NULL,
    close_time INTEGER NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    trades INTEGER,
    vwap REAL,
    PRIMARY KEY (symbol, timeframe, open_time)
);

CREATE TABLE IF NOT EXISTS windows (
    window_id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    t_end INTEGER NOT NULL,
    w INTEGER NOT NULL,
    feature_version INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_windows_symbol_tf ON windows(symbol, timeframe);
CREATE INDEX IF NOT EXISTS idx_windows_t_end ON windows(t_end);

CREATE TABLE IF NOT EXISTS window_features (
    window_id TEXT PRIMARY KEY,
    trend_slope REAL NOT NULL,
    realized_volatility REAL NOT NULL,
    max_drawdown REAL NOT NULL,
    atr REAL NOT NULL,
    vol_z_score REAL NOT NULL,
    vol_bucket INTEGER NOT NULL,
    trend_bucket INTEGER NOT NULL,
    feature_version INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_features_buckets ON window_features(vol_bucket, trend_bucket);

CREATE TABLE IF NOT EXISTS window_outcomes (
    window_id TEXT NOT NULL,
    horizon INTEGER NOT NULL,
    fwd_ret_mean REAL NOT NULL,
    fwd_ret_p10 REAL NOT NULL,
    fwd_ret_p50 REAL NOT NULL,
    fwd_ret_p90 REAL NOT NULL,
    max_drawdown REAL NOT NULL,
    fwd_candles INTEGER NOT NULL,
    PRIMARY KEY (window_id, horizon)
);
";

const CANDLE_COLUMNS: &str =
    "symbol, timeframe, open_time, close_time, open, high, low, close, volume, trades, vwap";

fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_millis(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(0, ms)
    })
}

const FEATURE_COLUMNS: &str = "window_id, trend_slope, realized_volatility, max_drawdown, \
     atr, vol_z_score, vol_bucket, trend_bucket, feature_version";

fn feature_from_row(row: &Row<'_>) -> rusqlite::Result<FeatureRow> {
    Ok(FeatureRow {
        window_id: row.get(0)?,
        trend_slope: row.get(1)?,
        realized_volatility: row.get(2)?,
        max_drawdown: row.get(3)?,
        atr: row.get(4)?,
        vol_z_score: row.get(5)?,
        vol_bucket: row.get(6)?,
        trend_bucket: row.get(7)?,
        feature_version: row.get(8)?,
    })
}

fn candle_from_row(row: &Row<'_>) -> rusqlite::Result<Candle> {
    Ok(Candle {
        symbol: row.get(0)?,
        timeframe: row.get(1)?,
        open_time: from_millis(row.get(2)?)?,
        close_time: from_millis(row.get(3)?)?,
        open: row.get(4)?,
        high: row.get(5)?,
        low: row.get(6)?,
        close: row.get(7)?,
        volume: row.get(8)?,
        trades: row.get(9)?,
        vwap: row.get(10)?,
    })
}

/// Shared SQLite connection implementing every storage collaborator
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and apply the schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::from_connection(conn)?;

        log::info!("SQLite store initialized: {}", db_path.as_ref().display());
        Ok(store)
    }

    /// Private in-memory database, mostly for tests
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(format!("connection lock poisoned: {}", e)))
    }

    pub fn insert_candles(&self, candles: &[Candle]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO candles ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                CANDLE_COLUMNS
            ))?;
            for c in candles {
                stmt.execute(params![
                    c.symbol,
                    c.timeframe,
                    to_millis(c.open_time),
                    to_millis(c.close_time),
                    c.open,
                    c.high,
                    c.low,
                    c.close,
                    c.volume,
                    c.trades,
                    c.vwap,
                ])?;
            }
        }
        tx.commit()?;
        Ok(candles.len())
    }

    /// Window headers; the first write of an id wins
    pub fn insert_windows(&self, windows: &[Window]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO windows
                    (window_id, symbol, timeframe, t_end, w, feature_version, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for w in windows {
                stmt.execute(params![
                    w.window_id,
                    w.symbol,
                    w.timeframe,
                    to_millis(w.t_end),
                    w.w as i64,
                    w.feature_version,
                    to_millis(w.created_at),
                ])?;
            }
        }
        tx.commit()?;
        Ok(windows.len())
    }

    pub fn insert_features(&self, features: &[FeatureRow]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO window_features
                    (window_id, trend_slope, realized_volatility, max_drawdown,
                     atr, vol_z_score, vol_bucket, trend_bucket, feature_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for f in features {
                stmt.execute(params![
                    f.window_id,
                    f.trend_slope,
                    f.realized_volatility,
                    f.max_drawdown,
                    f.atr,
                    f.vol_z_score,
                    f.vol_bucket,
                    f.trend_bucket,
                    f.feature_version,
                ])?;
            }
        }
        tx.commit()?;
        Ok(features.len())
    }

    /// Cache resolved outcomes; partial ones are skipped
    pub fn insert_outcomes(&self, outcomes: &[Outcome]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO window_outcomes
                    (window_id, horizon, fwd_ret_mean, fwd_ret_p10, fwd_ret_p50,
                     fwd_ret_p90, max_drawdown, fwd_candles)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for o in outcomes.iter().filter(|o| o.is_resolved()) {
                stmt.execute(params![
                    o.window_id,
                    o.horizon as i64,
                    o.fwd_ret_mean,
                    o.fwd_ret_p10,
                    o.fwd_ret_p50,
                    o.fwd_ret_p90,
                    o.max_drawdown,
                    o.fwd_candles as i64,
                ])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn feature_by_id(&self, window_id: &str) -> Result<Option<FeatureRow>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM window_features WHERE window_id = ?1", FEATURE_COLUMNS),
                params![window_id],
                feature_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Up to `limit` feature rows in one (vol, trend) bucket pair, in write order
    pub fn features_by_buckets(
        &self,
        vol_bucket: i32,
        trend_bucket: i32,
        limit: usize,
    ) -> Result<Vec<FeatureRow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM window_features
             WHERE vol_bucket = ?1 AND trend_bucket = ?2
             ORDER BY rowid ASC
             LIMIT ?3",
            FEATURE_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![vol_bucket, trend_bucket, limit as i64],
            feature_from_row,
        )?;
        let features = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(features)
    }

    pub fn window_exists(&self, window_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM windows WHERE window_id = ?1",
            params![window_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn outcomes_for_window(&self, window_id: &str) -> Result<Vec<Outcome>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT window_id, horizon, fwd_ret_mean, fwd_ret_p10, fwd_ret_p50,
                    fwd_ret_p90, max_drawdown, fwd_candles
             FROM window_outcomes WHERE window_id = ?1 ORDER BY horizon ASC",
        )?;
        let rows = stmt.query_map(params![window_id], |row| {
            Ok(Outcome {
                window_id: row.get(0)?,
                horizon: row.get::<_, i64>(1)? as usize,
                fwd_ret_mean: row.get(2)?,
                fwd_ret_p10: row.get(3)?,
                fwd_ret_p50: row.get(4)?,
                fwd_ret_p90: row.get(5)?,
                max_drawdown: row.get(6)?,
                fwd_candles: row.get::<_, i64>(7)? as usize,
            })
        })?;
        let outcomes = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(outcomes)
    }

    pub fn count_windows(&self, symbol: &str, timeframe: &str) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM windows WHERE symbol = ?1 AND timeframe = ?2",
            params![symbol, timeframe],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query_candles(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Candle>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, candle_from_row)?;
        let candles = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(candles)
    }
}

#[async_trait]
impl CandleStore for SqliteStore {
    async fn candles_in_range(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, StoreError> {
        self.query_candles(
            &format!(
                "SELECT {} FROM candles
                 WHERE symbol = ?1 AND timeframe = ?2 AND open_time >= ?3 AND open_time <= ?4
                 ORDER BY open_time ASC",
                CANDLE_COLUMNS
            ),
            params![symbol, timeframe, to_millis(start), to_millis(end)],
        )
    }

    async fn latest_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, StoreError> {
        let mut candles = self.query_candles(
            &format!(
                "SELECT {} FROM candles
                 WHERE symbol = ?1 AND timeframe = ?2
                 ORDER BY open_time DESC LIMIT ?3",
                CANDLE_COLUMNS
            ),
            params![symbol, timeframe, limit as i64],
        )?;
        candles.reverse();
        Ok(candles)
    }
}

#[async_trait]
impl WindowStore for SqliteStore {
    /// Window header plus its candles rebuilt from the candles table
    /// (the `w` newest candles closing at or before `t_end`).
    async fn window_by_id(&self, window_id: &str) -> Result<Option<Window>, StoreError> {
        let header = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT window_id, symbol, timeframe, t_end, w, feature_version, created_at
                 FROM windows WHERE window_id = ?1",
                params![window_id],
                |row| {
                    Ok(Window {
                        window_id: row.get(0)?,
                        symbol: row.get(1)?,
                        timeframe: row.get(2)?,
                        t_end: from_millis(row.get(3)?)?,
                        w: row.get::<_, i64>(4)? as usize,
                        feature_version: row.get(5)?,
                        candles: Vec::new(),
                        created_at: from_millis(row.get(6)?)?,
                    })
                },
            )
            .optional()?
        };

        let Some(mut window) = header else {
            return Ok(None);
        };

        let mut candles = self.query_candles(
            &format!(
                "SELECT {} FROM candles
                 WHERE symbol = ?1 AND timeframe = ?2 AND close_time <= ?3
                 ORDER BY open_time DESC LIMIT ?4",
                CANDLE_COLUMNS
            ),
            params![
                window.symbol,
                window.timeframe,
                to_millis(window.t_end),
                window.w as i64
            ],
        )?;
        candles.reverse();
        window.candles = candles;

        Ok(Some(window))
    }
}

#[async_trait]
impl BatchSink for SqliteStore {
    async fn publish(&mut self, batch: &WriteBatch) -> Result<(), StoreError> {
        match batch {
            WriteBatch::Candles { candles } => {
                self.insert_candles(candles)?;
            }
            WriteBatch::Windows { windows, features } => {
                self.insert_windows(windows)?;
                self.insert_features(features)?;
            }
            WriteBatch::Vectors { vectors } => {
                // Embeddings belong to the vector index, not the relational store
                log::debug!("SQLite sink ignoring {} vector records", vectors.len());
                return Ok(());
            }
        }
        log::debug!("SQLite sink wrote {} {}", batch.len(), batch.kind());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::candle::test_support::{candle_at, close_at};
    use tempfile::tempdir;

    fn sample_candles(n: i64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64;
                let mut c = candle_at(i, base, base + 2.0, 99.0, base + 1.0, 10.0);
                c.trades = Some(i * 3);
                c
            })
            .collect()
    }

    fn sample_feature(window_id: &str) -> FeatureRow {
        FeatureRow {
            window_id: window_id.to_string(),
            trend_slope: 0.01,
            realized_volatility: 0.02,
            max_drawdown: 0.03,
            atr: 0.04,
            vol_z_score: 1.5,
            vol_bucket: 8,
            trend_bucket: 1,
            feature_version: 1,
        }
    }

    #[tokio::test]
    async fn test_candle_roundtrip_and_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        let candles = sample_candles(5);
        store.insert_candles(&candles).unwrap();
        // Replaying the same batch must not duplicate rows
        store.insert_candles(&candles).unwrap();

        let loaded = store
            .candles_in_range("BTCUSDT", "1m", candles[0].open_time, candles[4].open_time)
            .await
            .unwrap();
        assert_eq!(loaded, candles);

        let latest = store.latest_candles("BTCUSDT", "1m", 2).await.unwrap();
        assert_eq!(latest, candles[3..].to_vec());
    }

    #[tokio::test]
    async fn test_window_writes_are_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("etna.db");
        let mut store = SqliteStore::open(&db_path).unwrap();

        let candles = sample_candles(6);
        let window =
            Window::new("BTCUSDT", "1m", candles[5].close_time, 3, 1, candles[3..].to_vec());
        let batch = WriteBatch::Windows {
            windows: vec![window.clone()],
            features: vec![sample_feature(&window.window_id)],
        };

        store.publish(&WriteBatch::Candles { candles: candles.clone() }).await.unwrap();
        store.publish(&batch).await.unwrap();
        store.publish(&batch).await.unwrap();
        store.flush().await.unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM windows", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.count_windows("BTCUSDT", "1m").unwrap(), 1);

        let feature = store.feature_by_id(&window.window_id).unwrap().unwrap();
        assert_eq!(feature, sample_feature(&window.window_id));

        let loaded = store.window_by_id(&window.window_id).await.unwrap().unwrap();
        assert_eq!(loaded.t_end, window.t_end);
        assert_eq!(loaded.w, 3);
        assert_eq!(loaded.candles, window.candles);

        assert!(store.window_by_id("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_features_by_buckets() {
        let store = SqliteStore::in_memory().unwrap();
        let mut rows = Vec::new();
        for (i, (vol, trend)) in [(8, 1), (8, 1), (3, 1), (8, -2), (8, 1)].iter().enumerate() {
            let mut row = sample_feature(&format!("w{}", i));
            row.vol_bucket = *vol;
            row.trend_bucket = *trend;
            rows.push(row);
        }
        store.insert_features(&rows).unwrap();

        let hits = store.features_by_buckets(8, 1, 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|f| f.window_id.as_str()).collect();
        assert_eq!(ids, vec!["w0", "w1", "w4"]);
        assert_eq!(hits[0], rows[0]);

        assert_eq!(store.features_by_buckets(8, 1, 2).unwrap().len(), 2);
        assert!(store.features_by_buckets(0, 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_window_exists() {
        let store = SqliteStore::in_memory().unwrap();
        let candle = close_at(0, 1.0);
        let window = Window::new("BTCUSDT", "1m", candle.close_time, 1, 1, vec![candle]);
        assert!(!store.window_exists(&window.window_id).unwrap());

        store.insert_windows(&[window.clone()]).unwrap();
        assert!(store.window_exists(&window.window_id).unwrap());
        assert!(!store.window_exists("missing").unwrap());
    }

    #[tokio::test]
    async fn test_outcome_cache_skips_partial() {
        let store = SqliteStore::in_memory().unwrap();
        let resolved = Outcome {
            window_id: "w1".to_string(),
            horizon: 2,
            fwd_ret_mean: 0.01,
            fwd_ret_p10: -0.01,
            fwd_ret_p50: 0.01,
            fwd_ret_p90: 0.03,
            max_drawdown: 0.02,
            fwd_candles: 2,
        };
        let partial = Outcome::partial("w1", 20, 3);

        let written = store.insert_outcomes(&[resolved.clone(), partial]).unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.outcomes_for_window("w1").unwrap(), vec![resolved]);
    }

    #[tokio::test]
    async fn test_vectors_ignored_by_sqlite_sink() {
        let mut store = SqliteStore::in_memory().unwrap();
        let candle = close_at(0, 1.0);
        let window = Window::new("BTCUSDT", "1m", candle.close_time, 1, 1, vec![candle]);
        let record = crate::store::VectorRecord::new(
            &window,
            &sample_feature(&window.window_id),
            crate::model::ShapeVector::zeros(4),
        );
        store
            .publish(&WriteBatch::Vectors { vectors: vec![record] })
            .await
            .unwrap();
        assert_eq!(store.backend_type(), "SQLite");
        assert_eq!(store.count_windows("BTCUSDT", "1m").unwrap(), 0);
    }
}
