//! Time-decay reranking of similarity results

use crate::config::ConfigError;
use crate::store::SearchResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Fixed weights for three age segments
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentWeights {
    /// Ages up to this many days get `recent_weight`
    pub recent_days: f64,
    /// Ages up to this many days get `medium_weight`
    pub medium_days: f64,
    pub recent_weight: f64,
    pub medium_weight: f64,
    pub old_weight: f64,
}

impl Default for SegmentWeights {
    fn default() -> Self {
        Self {
            recent_days: 3.0,
            medium_days: 30.0,
            recent_weight: 1.0,
            medium_weight: 0.7,
            old_weight: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecayMode {
    /// `exp(-lambda * age_days)`
    Exponential { lambda: f64 },
    Segmented(SegmentWeights),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeDecayConfig {
    pub mode: DecayMode,
}

impl Default for TimeDecayConfig {
    fn default() -> Self {
        Self::exponential(0.1)
    }
}

impl TimeDecayConfig {
    pub fn exponential(lambda: f64) -> Self {
        Self {
            mode: DecayMode::Exponential { lambda },
        }
    }

    /// 3 / 30 day segments weighted 1.0 / 0.7 / 0.4
    pub fn segments() -> Self {
        Self {
            mode: DecayMode::Segmented(SegmentWeights::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.mode {
            DecayMode::Exponential { lambda } => {
                if !lambda.is_finite() || *lambda < 0.0 {
                    return Err(ConfigError::InvalidValue(format!(
                        "decay lambda must be a non-negative number (got {})",
                        lambda
                    )));
                }
            }
            DecayMode::Segmented(w) => {
                if w.recent_days < 0.0 || w.medium_days < w.recent_days {
                    return Err(ConfigError::InvalidValue(format!(
                        "segment bounds must satisfy 0 <= recent ({}) <= medium ({})",
                        w.recent_days, w.medium_days
                    )));
                }
            }
        }
        Ok(())
    }

    /// Weight for a result `age_days` old
    pub fn weight(&self, age_days: f64) -> f64 {
        match &self.mode {
            DecayMode::Exponential { lambda } => (-lambda * age_days).exp(),
            DecayMode::Segmented(w) => {
                if age_days <= w.recent_days {
                    w.recent_weight
                } else if age_days <= w.medium_days {
                    w.medium_weight
                } else {
                    w.old_weight
                }
            }
        }
    }
}

/// A search hit with its time weight applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub result: SearchResult,
    pub original_score: f32,
    pub time_weight: f64,
    pub final_score: f64,
}

/// Age of `t_end` relative to `now` in fractional days; future times count as 0
pub fn age_days(t_end: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed = now.signed_duration_since(t_end);
    let seconds = elapsed.num_milliseconds() as f64 / 1_000.0;
    (seconds / SECONDS_PER_DAY).max(0.0)
}

/// Stateless reranker: `final = score * weight(age)`
#[derive(Debug, Clone, Default)]
pub struct Reranker {
    config: TimeDecayConfig,
}

impl Reranker {
    pub fn new(config: TimeDecayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TimeDecayConfig {
        &self.config
    }

    /// Weight every result and sort by fused score, highest first
    pub fn rerank(&self, results: Vec<SearchResult>, now: DateTime<Utc>) -> Vec<RankedResult> {
        let mut ranked: Vec<RankedResult> = results
            .into_iter()
            .map(|result| {
                let weight = self.config.weight(age_days(result.t_end, now));
                RankedResult {
                    original_score: result.score,
                    time_weight: weight,
                    final_score: f64::from(result.score) * weight,
                    result,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        ranked
    }

    pub fn top_n(
        &self,
        results: Vec<SearchResult>,
        now: DateTime<Utc>,
        n: usize,
    ) -> Vec<RankedResult> {
        let mut ranked = self.rerank(results, now);
        ranked.truncate(n);
        ranked
    }
}

/// Keep results whose fused score is at least `min_score`, preserving order
pub fn filter_by_min_score(results: Vec<RankedResult>, min_score: f64) -> Vec<RankedResult> {
    results
        .into_iter()
        .filter(|r| r.final_score >= min_score)
        .collect()
}
