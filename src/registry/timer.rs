use std::time::{Duration, Instant};

use super::histogram::{Histogram, HistogramSnapshot};
use super::meter::{Meter, MeterSnapshot};
use super::view::{DistributionView, RatesView};
use crate::error::RegistryError;

/// Duration distribution (in nanoseconds) plus the rate of timed events.
#[derive(Debug)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
}

#[derive(Debug, Clone)]
pub struct TimerSnapshot {
    histogram: HistogramSnapshot,
    meter: MeterSnapshot,
}

impl Timer {
    pub fn new() -> Result<Self, RegistryError> {
        Ok(Self {
            histogram: Histogram::new()?,
            meter: Meter::new(),
        })
    }

    pub fn update(&self, elapsed: Duration) {
        let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark(1);
    }

    pub fn update_since(&self, start: Instant) {
        self.update(start.elapsed());
    }

    /// Run `f` and record how long it took.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.update_since(start);
        out
    }

    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            histogram: self.histogram.snapshot(),
            meter: self.meter.snapshot(),
        }
    }
}

impl DistributionView for TimerSnapshot {
    fn count(&self) -> u64 {
        self.histogram.count()
    }

    fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    fn std_dev(&self) -> f64 {
        self.histogram.std_dev()
    }

    fn min(&self) -> f64 {
        self.histogram.min()
    }

    fn max(&self) -> f64 {
        self.histogram.max()
    }

    fn percentile(&self, p: f64) -> f64 {
        self.histogram.percentile(p)
    }
}

impl RatesView for TimerSnapshot {
    fn rate1(&self) -> f64 {
        self.meter.rate1
    }

    fn rate5(&self) -> f64 {
        self.meter.rate5
    }

    fn rate15(&self) -> f64 {
        self.meter.rate15
    }
}
