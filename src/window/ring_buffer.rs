//! Fixed-capacity, overwrite-oldest candle buffer
//!
//! One buffer per symbol/timeframe. A single writer pushes while any number of
//! readers take snapshots; the ring state sits behind an `RwLock` so every read
//! sees a consistent point-in-time view.

use crate::model::Candle;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct Ring {
    slots: Vec<Option<Candle>>,
    /// Next write position
    head: usize,
    size: usize,
}

impl Ring {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            head: 0,
            size: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot index of the oldest held candle
    fn start(&self) -> usize {
        if self.size == self.capacity() {
            self.head
        } else {
            0
        }
    }

    fn push(&mut self, candle: Candle) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        self.slots[self.head] = Some(candle);
        self.head = (self.head + 1) % capacity;
        if self.size < capacity {
            self.size += 1;
        }
    }

    fn ordered(&self) -> Vec<Candle> {
        let capacity = self.capacity();
        let start = self.start();
        (0..self.size)
            .filter_map(|i| self.slots[(start + i) % capacity].clone())
            .collect()
    }

    fn first(&self) -> Option<Candle> {
        if self.size == 0 {
            return None;
        }
        self.slots[self.start()].clone()
    }

    fn last(&self) -> Option<Candle> {
        if self.size == 0 {
            return None;
        }
        let capacity = self.capacity();
        self.slots[(self.head + capacity - 1) % capacity].clone()
    }

    fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.size = 0;
    }
}

/// Circular buffer of candles with ring semantics: `push` never fails and
/// never grows, it overwrites the oldest slot once full.
#[derive(Debug)]
pub struct CircularCandleBuffer {
    ring: RwLock<Ring>,
}

impl CircularCandleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RwLock::new(Ring::with_capacity(capacity)),
        }
    }

    // A panicked writer cannot leave the ring half-updated (every mutation is
    // a couple of field stores), so poisoned locks are recovered.
    fn read(&self) -> RwLockReadGuard<'_, Ring> {
        self.ring.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Ring> {
        self.ring.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a candle, overwriting the oldest one when full
    pub fn push(&self, candle: Candle) {
        self.write().push(candle);
    }

    pub fn size(&self) -> usize {
        self.read().size
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        let ring = self.read();
        ring.size == ring.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    /// All held candles, oldest first. Always returns exactly `size()` entries.
    pub fn to_ordered_vec(&self) -> Vec<Candle> {
        self.read().ordered()
    }

    /// Oldest held candle
    pub fn first(&self) -> Option<Candle> {
        self.read().first()
    }

    /// Newest held candle
    pub fn last(&self) -> Option<Candle> {
        self.read().last()
    }

    /// Reset to empty, keeping the allocated slots
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Independent buffer with identical contents and capacity
    pub fn deep_copy(&self) -> Self {
        Self {
            ring: RwLock::new(self.read().clone()),
        }
    }
}

impl Clone for CircularCandleBuffer {
    fn clone(&self) -> Self {
        self.deep_copy()
    }
}
