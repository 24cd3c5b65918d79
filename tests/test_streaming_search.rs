//! Integration tests for live streaming and similarity search
//!
//! Tests verify that a builder fed from an mpsc channel emits the expected
//! windows while other tasks read its buffer, and that vectors published
//! through a `ChannelSink` can back a similarity index whose hits are
//! reranked by recency.

#[cfg(test)]
mod streaming_search_tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use etna::feature::ExtractorConfig;
    use etna::rerank::{filter_by_min_score, search_similar, Reranker, TimeDecayConfig};
    use etna::store::{
        symbol_filter, ChannelSink, SearchResult, SimilarityIndex, StoreError, VectorRecord,
        WriteBatch,
    };
    use etna::window::{BuilderConfig, WindowBuilder};
    use etna::{Candle, FeatureExtractor, ShapeVector, WindowPipeline};
    use tokio::sync::mpsc;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn candle(i: i64) -> Candle {
        let open = 50.0 + 3.0 * (i as f64 * 0.45).sin() + i as f64 * 0.01;
        let close = 50.0 + 3.0 * ((i + 1) as f64 * 0.45).sin() + i as f64 * 0.01;
        let open_time = base_time() + Duration::hours(i);
        Candle {
            symbol: "ETHUSDT".to_string(),
            timeframe: "1h".to_string(),
            open_time,
            close_time: open_time + Duration::hours(1) - Duration::milliseconds(1),
            open,
            high: open.max(close) + 0.2,
            low: open.min(close) - 0.25,
            close,
            volume: 1_000.0 + (i % 5) as f64 * 120.0,
            trades: None,
            vwap: None,
        }
    }

    #[tokio::test]
    async fn test_channel_fed_builder_with_concurrent_readers() {
        let _ = env_logger::builder().is_test(true).try_init();

        // 1. Producer task streams 50 candles
        let (tx, mut rx) = mpsc::channel::<Candle>(8);
        tokio::spawn(async move {
            for i in 0..50 {
                if tx.send(candle(i)).await.is_err() {
                    break;
                }
            }
        });

        let mut config = BuilderConfig::default_for("ETHUSDT", "1h");
        config.w = 10;
        config.s = 4;
        let mut builder = WindowBuilder::new(config).unwrap();
        let buffer = builder.buffer_handle();

        // 2. Reader task polls the shared buffer while the builder writes
        let reader = tokio::spawn(async move {
            let mut max_seen = 0;
            for _ in 0..200 {
                let snapshot = buffer.to_ordered_vec();
                assert!(snapshot.len() <= 10);
                assert!(snapshot.windows(2).all(|p| p[0].open_time < p[1].open_time));
                max_seen = max_seen.max(snapshot.len());
                tokio::task::yield_now().await;
            }
            max_seen
        });

        // 3. Consumer drives the builder
        let mut emitted = Vec::new();
        while let Some(c) = rx.recv().await {
            if let Some(window) = builder.push(c) {
                emitted.push(window);
            }
        }

        // Emissions after candles 10, 14, ..., 50
        assert_eq!(emitted.len(), 11);
        assert!(emitted.iter().all(|w| w.is_complete()));
        assert_eq!(emitted[1].t_end, candle(13).close_time);
        assert!(reader.await.unwrap() <= 10);
    }

    /// Brute-force cosine index over published vector records
    struct BruteForceIndex {
        records: Vec<VectorRecord>,
    }

    fn cosine(a: &ShapeVector, b: &ShapeVector) -> f32 {
        let dot: f32 = a.as_slice().iter().zip(b.as_slice()).map(|(x, y)| x * y).sum();
        let na: f32 = a.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            return 0.0;
        }
        dot / (na * nb)
    }

    #[async_trait]
    impl SimilarityIndex for BruteForceIndex {
        async fn search(
            &self,
            query: &ShapeVector,
            filter: Option<&str>,
            top_k: usize,
        ) -> Result<Vec<SearchResult>, StoreError> {
            let mut hits: Vec<SearchResult> = self
                .records
                .iter()
                .filter(|r| filter.map_or(true, |f| f == symbol_filter(&r.symbol, &r.timeframe)))
                .map(|r| SearchResult {
                    window_id: r.window_id.clone(),
                    score: cosine(query, &r.embedding),
                    symbol: r.symbol.clone(),
                    timeframe: r.timeframe.clone(),
                    t_end: r.t_end,
                    vol_bucket: r.vol_bucket,
                    trend_bucket: r.trend_bucket,
                    feature_version: r.feature_version,
                })
                .collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.truncate(top_k);
            Ok(hits)
        }
    }

    #[tokio::test]
    async fn test_published_vectors_back_reranked_search() {
        let _ = env_logger::builder().is_test(true).try_init();

        // 1. Pipeline publishes into a channel
        let (sink, mut rx) = ChannelSink::bounded(64);
        let mut config = BuilderConfig::default_for("ETHUSDT", "1h");
        config.w = 24;
        config.s = 6;
        let builder = WindowBuilder::new(config).unwrap();
        let extractor = FeatureExtractor::new(ExtractorConfig::default()).unwrap();
        let mut pipeline = WindowPipeline::new(builder, extractor, sink, 5);

        let summary = pipeline.process((0..240).map(candle)).await.unwrap();
        assert_eq!(summary.windows, 37);
        drop(pipeline);

        // 2. Collect vector records from the channel
        let mut records = Vec::new();
        while let Some(batch) = rx.recv().await {
            if let WriteBatch::Vectors { vectors } = batch {
                records.extend(vectors);
            }
        }
        assert_eq!(records.len(), 37);
        assert!(records.iter().all(|r| r.embedding.dim() == 96));

        // 3. Query with the newest window's own vector
        let newest = records.last().unwrap().clone();
        let index = BruteForceIndex { records };
        let reranker = Reranker::new(TimeDecayConfig::exponential(0.05)).unwrap();
        let filter = symbol_filter("ETHUSDT", "1h");

        let ranked = search_similar(
            &index,
            &reranker,
            &newest.embedding,
            Some(&filter),
            10,
            newest.t_end,
        )
        .await
        .unwrap();

        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].result.window_id, newest.window_id);
        assert_eq!(ranked[0].time_weight, 1.0);
        assert!(ranked.windows(2).all(|p| p[0].final_score >= p[1].final_score));

        // 4. Other symbols are filtered out entirely
        let none = search_similar(
            &index,
            &reranker,
            &newest.embedding,
            Some(&symbol_filter("BTCUSDT", "1h")),
            10,
            newest.t_end,
        )
        .await
        .unwrap();
        assert!(none.is_empty());

        let strong = filter_by_min_score(ranked, 0.5);
        assert!(strong.iter().all(|r| r.final_score >= 0.5));
        assert!(!strong.is_empty());
    }
}
