use hdrhistogram::Histogram as HdrHistogram;
use parking_lot::Mutex;

use super::view::DistributionView;
use crate::error::RegistryError;

// ─── Configuration ───────────────────────────────────────────────

/// 3 significant figures; the histogram auto-resizes so there is no
/// upper bound to trip over.
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe sample distribution.
/// Instrumented code calls `update()`, the reporter calls `snapshot()`.
#[derive(Debug)]
pub struct Histogram {
    inner: Mutex<Inner>,
}

/// Frozen copy of a histogram, read without holding the lock.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    inner: Inner,
}

/// hdr buckets only approximate a sample, so the extremes are kept exactly
/// alongside them.
#[derive(Debug, Clone)]
struct Inner {
    hist: HdrHistogram<u64>,
    min: u64,
    max: u64,
}

impl Inner {
    fn record(&mut self, value: u64) -> Result<(), hdrhistogram::RecordError> {
        self.hist.record(value)?;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        Ok(())
    }

    fn reset(&mut self) {
        self.hist.reset();
        self.min = u64::MAX;
        self.max = 0;
    }
}

// ─── Histogram impl ──────────────────────────────────────────────

impl Histogram {
    pub fn new() -> Result<Self, RegistryError> {
        let hist = HdrHistogram::<u64>::new(HIST_SIGFIG)
            .map_err(|source| RegistryError::Histogram { source })?;
        Ok(Self {
            inner: Mutex::new(Inner {
                hist,
                min: u64::MAX,
                max: 0,
            }),
        })
    }

    /// Record one sample. Negative samples clamp to zero.
    pub fn update(&self, value: i64) {
        let value = u64::try_from(value).unwrap_or(0);
        if let Err(err) = self.inner.lock().record(value) {
            tracing::warn!(value, %err, "dropping histogram sample");
        }
    }

    pub fn clear(&self) {
        self.inner.lock().reset();
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().hist.len()
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            inner: self.inner.lock().clone(),
        }
    }
}

// ─── Snapshot accessors ──────────────────────────────────────────

impl HistogramSnapshot {
    fn has_data(&self) -> bool {
        self.inner.hist.len() > 0
    }
}

impl DistributionView for HistogramSnapshot {
    fn count(&self) -> u64 {
        self.inner.hist.len()
    }

    fn mean(&self) -> f64 {
        if self.has_data() {
            self.inner.hist.mean()
        } else {
            0.0
        }
    }

    fn std_dev(&self) -> f64 {
        if self.has_data() {
            self.inner.hist.stdev()
        } else {
            0.0
        }
    }

    fn min(&self) -> f64 {
        if self.has_data() {
            self.inner.min as f64
        } else {
            0.0
        }
    }

    fn max(&self) -> f64 {
        if self.has_data() {
            self.inner.max as f64
        } else {
            0.0
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if !self.has_data() || p.is_nan() {
            return 0.0;
        }
        self.inner.hist.value_at_quantile(p.clamp(0.0, 1.0)) as f64
    }
}
