//! Sliding window construction from a candle stream
//!
//! The builder is a two-state machine. It starts `WarmingUp` and latches into
//! `WarmedUp` once `warmup` candles have been pushed since construction or the
//! last reset (the buffer size, until the ring wraps); the transition forces
//! the step counter to `s` so the first window is emitted on that same push.
//! After that a window is emitted every `s` pushes while the buffer is full.

use super::ring_buffer::CircularCandleBuffer;
use crate::config::ConfigError;
use crate::model::{Candle, Window};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    /// Window length, also the buffer capacity
    pub w: usize,
    /// Pushes between emissions
    pub s: usize,
    /// Minimum candles before first output; 0 means `w`
    pub warmup: usize,
    pub feature_version: u32,
    pub symbol: String,
    pub timeframe: String,
}

impl BuilderConfig {
    /// 60-candle windows emitted on every candle
    pub fn default_for(symbol: &str, timeframe: &str) -> Self {
        Self {
            w: 60,
            s: 1,
            warmup: 0,
            feature_version: 1,
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.w == 0 {
            return Err(ConfigError::InvalidValue(
                "window length W must be greater than 0".to_string(),
            ));
        }
        if self.s == 0 {
            return Err(ConfigError::InvalidValue(
                "step S must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Warmup with the "unset means W" default applied
    pub fn effective_warmup(&self) -> usize {
        if self.warmup == 0 {
            self.w
        } else {
            self.warmup
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    WarmingUp,
    WarmedUp,
}

pub struct WindowBuilder {
    config: BuilderConfig,
    warmup: usize,
    buffer: Arc<CircularCandleBuffer>,
    state: BuilderState,
    step_count: usize,
    /// Pushes since construction or reset
    seen: usize,
}

impl WindowBuilder {
    pub fn new(config: BuilderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let warmup = config.effective_warmup();

        Ok(Self {
            buffer: Arc::new(CircularCandleBuffer::new(config.w)),
            warmup,
            config,
            state: BuilderState::WarmingUp,
            step_count: 0,
            seen: 0,
        })
    }

    /// Feed one candle; returns at most one window
    pub fn push(&mut self, candle: Candle) -> Option<Window> {
        self.buffer.push(candle);
        self.step_count += 1;
        self.seen += 1;

        if self.state == BuilderState::WarmingUp && self.seen >= self.warmup {
            self.state = BuilderState::WarmedUp;
            self.step_count = self.config.s;
            log::info!(
                "Window builder warmed up: {} {} (W={}, S={}, warmup={})",
                self.config.symbol,
                self.config.timeframe,
                self.config.w,
                self.config.s,
                self.warmup
            );
        }

        if self.state == BuilderState::WarmingUp || !self.buffer.is_full() {
            return None;
        }

        if self.step_count < self.config.s {
            return None;
        }

        self.step_count = 0;

        let candles = self.buffer.to_ordered_vec();
        let t_end = candles.last()?.close_time;

        let window = Window::new(
            &self.config.symbol,
            &self.config.timeframe,
            t_end,
            self.config.w,
            self.config.feature_version,
            candles,
        );

        log::debug!(
            "Emitted window {} ({} {} t_end={})",
            window.window_id,
            window.symbol,
            window.timeframe,
            window.t_end
        );

        Some(window)
    }

    /// Push every candle in order and collect the windows produced
    pub fn process_candles<I>(&mut self, candles: I) -> Vec<Window>
    where
        I: IntoIterator<Item = Candle>,
    {
        candles
            .into_iter()
            .filter_map(|candle| self.push(candle))
            .collect()
    }

    /// Drop buffered candles and start warming up again.
    /// Callers use this when they detect a gap in the stream.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.step_count = 0;
        self.seen = 0;
        self.state = BuilderState::WarmingUp;
        log::info!(
            "Window builder reset: {} {}",
            self.config.symbol,
            self.config.timeframe
        );
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn is_warmed_up(&self) -> bool {
        self.state == BuilderState::WarmedUp
    }

    pub fn current_size(&self) -> usize {
        self.buffer.size()
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Shared handle for read-only queries from other threads
    pub fn buffer_handle(&self) -> Arc<CircularCandleBuffer> {
        Arc::clone(&self.buffer)
    }
}
