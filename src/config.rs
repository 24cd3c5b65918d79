//! Engine configuration from environment variables
//!
//! Every tunable has a default; `EngineConfig::from_env` only fails when a
//! variable is set to something unparsable or the resulting values do not
//! validate.

use crate::feature::ExtractorConfig;
use crate::outcome::OutcomeConfig;
use crate::rerank::{DecayMode, TimeDecayConfig};
use crate::window::BuilderConfig;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level configuration for one symbol/timeframe stream
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub builder: BuilderConfig,
    pub extractor: ExtractorConfig,
    pub outcome: OutcomeConfig,
    pub rerank: TimeDecayConfig,
    /// Windows buffered by the pipeline before a flush
    pub batch_size: usize,
    /// Path to the SQLite database file
    pub db_path: String,
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ETNA_SYMBOL` (default: BTCUSDT)
    /// - `ETNA_TIMEFRAME` (default: 1m)
    /// - `ETNA_WINDOW_LEN` (default: 60)
    /// - `ETNA_STEP` (default: 1)
    /// - `ETNA_WARMUP` (default: 0, meaning the window length)
    /// - `ETNA_FEATURE_VERSION` (default: 1)
    /// - `ETNA_VECTOR_DIM` (default: 96)
    /// - `ETNA_CLIP_STD` (default: 3.0)
    /// - `ETNA_HORIZONS` (default: 5,20,60)
    /// - `ETNA_LOOKAHEAD_DAYS` (default: 30)
    /// - `ETNA_DECAY_LAMBDA` (default: 0.1)
    /// - `ETNA_DECAY_SEGMENTS` (default: false)
    /// - `ETNA_BATCH_SIZE` (default: 1000)
    /// - `ETNA_DB_PATH` (default: etna.db)
    pub fn from_env() -> Result<Self, ConfigError> {
        let symbol = env::var("ETNA_SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string());
        let timeframe = env::var("ETNA_TIMEFRAME").unwrap_or_else(|_| "1m".to_string());

        let mut builder = BuilderConfig::default_for(&symbol, &timeframe);
        builder.w = parse_var("ETNA_WINDOW_LEN", builder.w)?;
        builder.s = parse_var("ETNA_STEP", builder.s)?;
        builder.warmup = parse_var("ETNA_WARMUP", builder.warmup)?;
        builder.feature_version = parse_var("ETNA_FEATURE_VERSION", builder.feature_version)?;

        let mut extractor = ExtractorConfig::default();
        extractor.feature_version = builder.feature_version;
        extractor.vector_dim = parse_var("ETNA_VECTOR_DIM", extractor.vector_dim)?;
        extractor.clip_std = parse_var("ETNA_CLIP_STD", extractor.clip_std)?;

        let mut outcome = OutcomeConfig::default();
        if let Ok(raw) = env::var("ETNA_HORIZONS") {
            outcome.horizons = parse_horizons(&raw)?;
        }
        outcome.lookahead_days = parse_var("ETNA_LOOKAHEAD_DAYS", outcome.lookahead_days)?;

        let use_segments = parse_var("ETNA_DECAY_SEGMENTS", false)?;
        let rerank = if use_segments {
            TimeDecayConfig::segments()
        } else {
            let default_lambda = match TimeDecayConfig::default().mode {
                DecayMode::Exponential { lambda } => lambda,
                DecayMode::Segmented(_) => 0.1,
            };
            TimeDecayConfig::exponential(parse_var("ETNA_DECAY_LAMBDA", default_lambda)?)
        };

        let config = Self {
            builder,
            extractor,
            outcome,
            rerank,
            batch_size: parse_var("ETNA_BATCH_SIZE", 1_000)?,
            db_path: env::var("ETNA_DB_PATH").unwrap_or_else(|_| "etna.db".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.builder.validate()?;
        self.extractor.validate()?;
        self.outcome.validate()?;
        self.rerank.validate()?;

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Read `name`, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().to_lowercase().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(format!("{} has unparsable value '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

/// Comma-separated list of forward horizons, e.g. `5,20,60`
fn parse_horizons(raw: &str) -> Result<Vec<usize>, ConfigError> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>().map_err(|_| {
                ConfigError::InvalidValue(format!("ETNA_HORIZONS entry '{}' is not a bar count", s))
            })
        })
        .collect()
}
