//! Forward-looking outcome statistics per (window, horizon)

use super::stats::{forward_max_drawdown, mean, percentile, sorted};
use crate::config::ConfigError;
use crate::model::{Candle, Window};
use crate::store::{CandleStore, StoreError, WindowStore};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeConfig {
    /// Forward horizons, in bars
    pub horizons: Vec<usize>,
    /// Upper bound on how far past `t_end` forward candles are fetched
    pub lookahead_days: i64,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            horizons: vec![5, 20, 60],
            lookahead_days: 30,
        }
    }
}

impl OutcomeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizons.iter().any(|&h| h == 0) {
            return Err(ConfigError::InvalidValue(
                "outcome horizons must be at least 1 bar".to_string(),
            ));
        }
        if self.lookahead_days <= 0 {
            return Err(ConfigError::InvalidValue(format!(
                "lookahead_days must be positive (got {})",
                self.lookahead_days
            )));
        }
        Ok(())
    }
}

/// Forward statistics for one window at one horizon.
///
/// When fewer than `horizon` forward candles exist the statistics are all
/// zero and `fwd_candles` carries the count actually found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub window_id: String,
    pub horizon: usize,
    pub fwd_ret_mean: f64,
    pub fwd_ret_p10: f64,
    pub fwd_ret_p50: f64,
    pub fwd_ret_p90: f64,
    pub max_drawdown: f64,
    pub fwd_candles: usize,
}

impl Outcome {
    /// Not-yet-resolvable result
    pub fn partial(window_id: &str, horizon: usize, found: usize) -> Self {
        Self {
            window_id: window_id.to_string(),
            horizon,
            fwd_ret_mean: 0.0,
            fwd_ret_p10: 0.0,
            fwd_ret_p50: 0.0,
            fwd_ret_p90: 0.0,
            max_drawdown: 0.0,
            fwd_candles: found,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.fwd_candles > 0 && self.fwd_candles >= self.horizon
    }
}

/// Outcome for one horizon given ordered forward candles and the base price
pub fn compute_outcome(
    window_id: &str,
    horizon: usize,
    base_price: f64,
    forward: &[Candle],
) -> Outcome {
    if horizon == 0 || forward.len() < horizon {
        return Outcome::partial(window_id, horizon, forward.len());
    }

    let slice = &forward[..horizon];
    let returns: Vec<f64> = slice
        .iter()
        .map(|c| (c.close - base_price) / base_price)
        .collect();
    let ordered = sorted(&returns);

    Outcome {
        window_id: window_id.to_string(),
        horizon,
        fwd_ret_mean: mean(&returns),
        fwd_ret_p10: percentile(&ordered, 10.0),
        fwd_ret_p50: percentile(&ordered, 50.0),
        fwd_ret_p90: percentile(&ordered, 90.0),
        max_drawdown: forward_max_drawdown(base_price, slice),
        fwd_candles: horizon,
    }
}

/// Outcomes for every horizon from caller-supplied forward candles.
///
/// Candles at or before `t_end` are ignored. A window without candles
/// or with a zero last close yields nothing.
pub fn outcomes_for_window(
    window: &Window,
    forward: &[Candle],
    horizons: &[usize],
) -> Vec<Outcome> {
    let Some(last) = window.last_candle() else {
        return Vec::new();
    };
    let base_price = last.close;
    if base_price == 0.0 {
        log::warn!("⚠️  Skipping outcomes for {}: zero base price", window.window_id);
        return Vec::new();
    }

    let after: Vec<Candle> = forward
        .iter()
        .filter(|c| c.open_time > window.t_end)
        .cloned()
        .collect();

    horizons
        .iter()
        .map(|&h| compute_outcome(&window.window_id, h, base_price, &after))
        .collect()
}

/// Resolves outcomes for windows against a range-queryable candle store
pub struct OutcomeEngine<S> {
    store: S,
    config: OutcomeConfig,
}

impl<S: CandleStore> OutcomeEngine<S> {
    pub fn new(store: S, config: OutcomeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &OutcomeConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Forward candles strictly after `t_end`, bounded by the lookahead
    pub async fn forward_candles(&self, window: &Window) -> Result<Vec<Candle>, StoreError> {
        let end = window.t_end + Duration::days(self.config.lookahead_days);
        let candles = self
            .store
            .candles_in_range(&window.symbol, &window.timeframe, window.t_end, end)
            .await?;
        Ok(candles
            .into_iter()
            .filter(|c| c.open_time > window.t_end)
            .collect())
    }

    /// Outcomes for many windows. An empty `horizons` uses the configured ones.
    /// Windows whose forward fetch fails are logged and skipped.
    pub async fn calculate(&self, windows: &[Window], horizons: &[usize]) -> Vec<Outcome> {
        let horizons = if horizons.is_empty() {
            self.config.horizons.as_slice()
        } else {
            horizons
        };

        let mut outcomes = Vec::with_capacity(windows.len() * horizons.len());
        for window in windows {
            if window.last_candle().is_none() {
                continue;
            }

            let forward = match self.forward_candles(window).await {
                Ok(candles) => candles,
                Err(e) => {
                    log::warn!(
                        "⚠️  Failed to fetch forward candles for {}: {}",
                        window.window_id,
                        e
                    );
                    continue;
                }
            };

            outcomes.extend(outcomes_for_window(window, &forward, horizons));
        }

        log::debug!(
            "Computed {} outcomes for {} windows",
            outcomes.len(),
            windows.len()
        );
        outcomes
    }

    /// Resolve ids through `window_store`, then `calculate`. Unknown ids are skipped.
    pub async fn calculate_for_window_ids<W>(
        &self,
        window_ids: &[String],
        window_store: &W,
        horizons: &[usize],
    ) -> Vec<Outcome>
    where
        W: WindowStore + ?Sized,
    {
        let mut windows = Vec::with_capacity(window_ids.len());
        for id in window_ids {
            match window_store.window_by_id(id).await {
                Ok(Some(window)) => windows.push(window),
                Ok(None) => log::debug!("Window {} not found", id),
                Err(e) => log::warn!("⚠️  Failed to load window {}: {}", id, e),
            }
        }
        self.calculate(&windows, horizons).await
    }
}

/// Summary across many windows at one horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedOutcome {
    pub horizon: usize,
    pub sample_count: usize,
    pub mean_return: f64,
    pub mean_p10: f64,
    pub mean_p50: f64,
    pub mean_p90: f64,
    /// 95th percentile of the per-window forward drawdowns
    pub mdd_p95: f64,
}

impl std::fmt::Display for AggregatedOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Horizon: {} bars | Samples: {} | Mean: {:.4} | P10: {:.4} | P50: {:.4} | \
             P90: {:.4} | MDD95: {:.4}",
            self.horizon,
            self.sample_count,
            self.mean_return,
            self.mean_p10,
            self.mean_p50,
            self.mean_p90,
            self.mdd_p95
        )
    }
}

/// Group resolved outcomes by horizon; partial outcomes do not contribute
pub fn aggregate_outcomes(outcomes: &[Outcome]) -> BTreeMap<usize, AggregatedOutcome> {
    let mut by_horizon: BTreeMap<usize, Vec<&Outcome>> = BTreeMap::new();
    for o in outcomes.iter().filter(|o| o.is_resolved()) {
        by_horizon.entry(o.horizon).or_default().push(o);
    }

    by_horizon
        .into_iter()
        .map(|(horizon, group)| {
            let collect = |f: fn(&Outcome) -> f64| group.iter().map(|o| f(o)).collect::<Vec<_>>();
            let mdds = sorted(&collect(|o| o.max_drawdown));

            let summary = AggregatedOutcome {
                horizon,
                sample_count: group.len(),
                mean_return: mean(&collect(|o| o.fwd_ret_mean)),
                mean_p10: mean(&collect(|o| o.fwd_ret_p10)),
                mean_p50: mean(&collect(|o| o.fwd_ret_p50)),
                mean_p90: mean(&collect(|o| o.fwd_ret_p90)),
                mdd_p95: percentile(&mdds, 95.0),
            };
            (horizon, summary)
        })
        .collect()
}
