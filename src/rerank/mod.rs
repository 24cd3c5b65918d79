//! Reranking of similarity-search results by recency

pub mod time_decay;

pub use time_decay::{
    age_days, filter_by_min_score, DecayMode, RankedResult, Reranker, SegmentWeights,
    TimeDecayConfig,
};

use crate::model::ShapeVector;
use crate::store::{SimilarityIndex, StoreError};
use chrono::{DateTime, Utc};

/// Query `index` for the `k` nearest windows and rerank them against `now`
pub async fn search_similar<I>(
    index: &I,
    reranker: &Reranker,
    query: &ShapeVector,
    filter: Option<&str>,
    k: usize,
    now: DateTime<Utc>,
) -> Result<Vec<RankedResult>, StoreError>
where
    I: SimilarityIndex + ?Sized,
{
    let hits = index.search(query, filter, k).await?;
    log::debug!("Similarity search returned {} hits (k={})", hits.len(), k);
    Ok(reranker.rerank(hits, now))
}
