//! Backfill flow: candles → windows → features → write batches
//!
//! Pending candles, windows (with their feature rows) and vector records
//! are buffered and published as three separate batches. A flush happens
//! automatically once `batch_size` windows are pending, or once pending
//! candles reach a cap of `batch_size * max(W, S)` even if no window has
//! been emitted. Nothing is dropped from the pending buffers until the sink
//! accepts it, so a failed flush can simply be retried.

use crate::config::{ConfigError, EngineConfig};
use crate::feature::FeatureExtractor;
use crate::model::{Candle, FeatureRow, Window};
use crate::store::{BatchSink, StoreError, VectorRecord, WriteBatch};
use crate::window::WindowBuilder;

/// Counts of what a `process` call produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub candles: usize,
    pub windows: usize,
    pub vectors: usize,
}

pub struct WindowPipeline<K> {
    builder: WindowBuilder,
    extractor: FeatureExtractor,
    sink: K,
    batch_size: usize,
    max_pending_candles: usize,
    pending_candles: Vec<Candle>,
    pending_windows: Vec<Window>,
    pending_features: Vec<FeatureRow>,
    pending_vectors: Vec<VectorRecord>,
    vectors_built: usize,
}

impl<K: BatchSink> WindowPipeline<K> {
    pub fn new(
        builder: WindowBuilder,
        extractor: FeatureExtractor,
        sink: K,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.max(1);
        let per_window = builder.config().w.max(builder.config().s);
        Self {
            builder,
            extractor,
            sink,
            batch_size,
            max_pending_candles: batch_size.saturating_mul(per_window),
            pending_candles: Vec::new(),
            pending_windows: Vec::new(),
            pending_features: Vec::new(),
            pending_vectors: Vec::new(),
            vectors_built: 0,
        }
    }

    pub fn from_config(config: &EngineConfig, sink: K) -> Result<Self, ConfigError> {
        config.validate()?;
        let builder = WindowBuilder::new(config.builder.clone())?;
        let extractor = FeatureExtractor::new(config.extractor.clone())?;

        log::info!(
            "🪟 Window pipeline for {} {} (W={}, S={}, dim={}) → {}",
            config.builder.symbol,
            config.builder.timeframe,
            config.builder.w,
            config.builder.s,
            config.extractor.vector_dim,
            sink.backend_type()
        );

        Ok(Self::new(builder, extractor, sink, config.batch_size))
    }

    /// Flush once this many candles are pending, even with no window emitted
    pub fn with_candle_cap(mut self, max_pending_candles: usize) -> Self {
        self.max_pending_candles = max_pending_candles.max(1);
        self
    }

    /// Feed one candle. Returns the emitted window's id, if any.
    pub async fn push(&mut self, candle: Candle) -> Result<Option<String>, StoreError> {
        self.pending_candles.push(candle.clone());

        let window_id = match self.builder.push(candle) {
            Some(window) => Some(self.stage(window)),
            None => None,
        };

        if self.pending_windows.len() >= self.batch_size
            || self.pending_candles.len() >= self.max_pending_candles
        {
            self.flush().await?;
        }

        Ok(window_id)
    }

    fn stage(&mut self, window: Window) -> String {
        let window_id = window.window_id.clone();
        if let Some(features) = self.extractor.extract(&window) {
            self.pending_vectors
                .push(VectorRecord::new(&window, &features.row, features.vector));
            self.pending_features.push(features.row);
            self.vectors_built += 1;
        }
        self.pending_windows.push(window);
        window_id
    }

    /// Publish everything pending, then flush the sink
    pub async fn flush(&mut self) -> Result<(), StoreError> {
        let candles = self.pending_candles.len();
        let windows = self.pending_windows.len();

        if !self.pending_candles.is_empty() {
            let batch = WriteBatch::Candles {
                candles: std::mem::take(&mut self.pending_candles),
            };
            self.publish(batch).await?;
        }

        if !self.pending_windows.is_empty() {
            let batch = WriteBatch::Windows {
                windows: std::mem::take(&mut self.pending_windows),
                features: std::mem::take(&mut self.pending_features),
            };
            self.publish(batch).await?;
        }

        if !self.pending_vectors.is_empty() {
            let batch = WriteBatch::Vectors {
                vectors: std::mem::take(&mut self.pending_vectors),
            };
            self.publish(batch).await?;
        }

        self.sink.flush().await?;

        if candles > 0 || windows > 0 {
            log::debug!(
                "Flushed {} candles and {} windows to {}",
                candles,
                windows,
                self.sink.backend_type()
            );
        }
        Ok(())
    }

    /// Push every candle, then flush
    pub async fn process<I>(&mut self, candles: I) -> Result<PipelineSummary, StoreError>
    where
        I: IntoIterator<Item = Candle>,
    {
        let mut summary = PipelineSummary::default();
        let vectors_before = self.vectors_built;

        for candle in candles {
            summary.candles += 1;
            if self.push(candle).await?.is_some() {
                summary.windows += 1;
            }
        }
        summary.vectors = self.vectors_built - vectors_before;

        self.flush().await?;

        log::info!(
            "✅ Processed {} candles → {} windows, {} vectors",
            summary.candles,
            summary.windows,
            summary.vectors
        );
        Ok(summary)
    }

    /// Windows emitted but not yet published
    pub fn pending_windows(&self) -> usize {
        self.pending_windows.len()
    }

    pub fn pending_candles(&self) -> usize {
        self.pending_candles.len()
    }

    pub fn builder(&self) -> &WindowBuilder {
        &self.builder
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    async fn publish(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
        match self.sink.publish(&batch).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!(
                    "⚠️  {} rejected {} batch: {}",
                    self.sink.backend_type(),
                    batch.kind(),
                    e
                );
                self.restore(batch);
                Err(e)
            }
        }
    }

    /// Put a rejected batch back in front of anything queued since
    fn restore(&mut self, batch: WriteBatch) {
        match batch {
            WriteBatch::Candles { mut candles } => {
                candles.append(&mut self.pending_candles);
                self.pending_candles = candles;
            }
            WriteBatch::Windows {
                mut windows,
                mut features,
            } => {
                windows.append(&mut self.pending_windows);
                features.append(&mut self.pending_features);
                self.pending_windows = windows;
                self.pending_features = features;
            }
            WriteBatch::Vectors { mut vectors } => {
                vectors.append(&mut self.pending_vectors);
                self.pending_vectors = vectors;
            }
        }
    }
}
