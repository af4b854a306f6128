//! Read-only accessor contracts the snapshot builder consumes.
//!
//! Anything that can walk named metrics and hand out these views can be
//! reported, which is how tests drive the builder with synthetic registries.

use std::fmt;

/// Read side of a monotonic counter.
pub trait CounterView {
    fn count(&self) -> i64;
}

/// Read side of a point-in-time gauge.
pub trait GaugeView {
    fn value(&self) -> f64;
}

/// Sample statistics of a histogram-shaped metric.
pub trait DistributionView {
    fn count(&self) -> u64;
    fn mean(&self) -> f64;
    fn std_dev(&self) -> f64;
    fn min(&self) -> f64;
    fn max(&self) -> f64;
    /// `p` is a fraction in `[0, 1]`, e.g. `0.95`.
    fn percentile(&self, p: f64) -> f64;
}

/// Exponentially-weighted moving-average rates, in events per second.
pub trait RatesView {
    fn rate1(&self) -> f64;
    fn rate5(&self) -> f64;
    fn rate15(&self) -> f64;
}

pub trait MeterView: RatesView {
    fn count(&self) -> u64;
}

/// A timer is a distribution of durations plus the rate they occur at.
pub trait TimerView: DistributionView + RatesView {}

impl<T: DistributionView + RatesView + ?Sized> TimerView for T {}

pub trait HealthcheckView {
    /// Error recorded by the last check, `None` when healthy.
    fn error(&self) -> Option<String>;
}

/// One registry entry, borrowed for the duration of a visit.
#[derive(Clone, Copy)]
pub enum MetricView<'a> {
    Counter(&'a dyn CounterView),
    Gauge(&'a dyn GaugeView),
    Histogram(&'a dyn DistributionView),
    Meter(&'a dyn MeterView),
    Timer(&'a dyn TimerView),
    Healthcheck(&'a dyn HealthcheckView),
}

impl MetricView<'_> {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Histogram(_) => MetricKind::Histogram,
            Self::Meter(_) => MetricKind::Meter,
            Self::Timer(_) => MetricKind::Timer,
            Self::Healthcheck(_) => MetricKind::Healthcheck,
        }
    }
}

impl fmt::Debug for MetricView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MetricView").field(&self.kind()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Meter,
    Timer,
    Healthcheck,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Meter => "meter",
            Self::Timer => "timer",
            Self::Healthcheck => "healthcheck",
        };
        f.write_str(name)
    }
}

/// Anything the snapshot builder can walk.
///
/// `each` visits every entry exactly once, in no particular order. Each view
/// must be internally consistent; views of different metrics may be captured
/// at slightly different instants.
pub trait MetricsRegistry {
    fn each(&self, visit: &mut dyn FnMut(&str, MetricView<'_>));
}
