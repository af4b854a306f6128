use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use super::view::{CounterView, GaugeView};

/// Signed cumulative counter.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, delta: i64) {
        self.count.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn dec(&self, delta: i64) {
        self.count.fetch_sub(delta, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl CounterView for Counter {
    fn count(&self) -> i64 {
        Counter::count(self)
    }
}

/// Instantaneous value, stored as `f64` bits so updates stay lock-free.
#[derive(Debug)]
pub struct Gauge {
    bits: AtomicU64,
}

impl Default for Gauge {
    fn default() -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl GaugeView for Gauge {
    fn value(&self) -> f64 {
        Gauge::value(self)
    }
}
