use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::batch::Batch;
use super::measurement::{Attributes, Measurement, Period};
use super::summary::{summarize, SumSquaresFallback};
use crate::error::BuildError;
use crate::registry::{DistributionView, MetricView, MetricsRegistry, RatesView, TimerView};

/// Everything a snapshot needs besides the registry itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub interval: Duration,
    pub source: String,
    /// Fractions in `[0, 1]`, reported in this order.
    pub percentiles: Vec<f64>,
    pub sum_squares_fallback: SumSquaresFallback,
}

/// Turns the live state of a registry into a Librato [`Batch`].
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    options: BuildOptions,
    period: Period,
}

impl SnapshotBuilder {
    pub fn new(options: BuildOptions) -> Self {
        let period = Period::new(options.interval);
        Self { options, period }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Walk `registry` once and collect every reportable metric.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry hands out an empty or repeated name;
    /// the partial batch is discarded.
    pub fn build<R>(&self, now: DateTime<Utc>, registry: &R) -> Result<Batch, BuildError>
    where
        R: MetricsRegistry + ?Sized,
    {
        let mut batch = Batch {
            measure_time: now.timestamp(),
            source: self.options.source.clone(),
            counters: Vec::new(),
            gauges: Vec::new(),
        };
        let mut seen = HashSet::new();
        let mut failure = None;

        registry.each(&mut |name, view| {
            if failure.is_some() {
                return;
            }
            if name.is_empty() {
                failure = Some(BuildError::EmptyName);
                return;
            }
            if !seen.insert(name.to_owned()) {
                failure = Some(BuildError::DuplicateName {
                    name: name.to_owned(),
                });
                return;
            }
            self.append(&mut batch, name, view);
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(batch),
        }
    }

    fn append(&self, batch: &mut Batch, name: &str, view: MetricView<'_>) {
        let period = self.period;
        match view {
            MetricView::Counter(counter) => batch.counters.push(Measurement::value(
                format!("{name}.count"),
                counter.count() as f64,
                period,
            )),
            MetricView::Gauge(gauge) => {
                let value = gauge.value();
                // serde_json writes NaN and infinities as null, which the API rejects
                if !value.is_finite() {
                    tracing::warn!(metric = name, value, "skipping non-finite gauge");
                    return;
                }
                batch.gauges.push(Measurement::value(name, value, period));
            }
            MetricView::Meter(meter) => {
                batch
                    .counters
                    .push(Measurement::value(name, meter.count() as f64, period));
                batch.gauges.extend(
                    rate_windows(meter)
                        .map(|(window, rate)| {
                            Measurement::value(format!("{name}.{window}"), rate, period)
                        }),
                );
            }
            MetricView::Histogram(hist) => self.append_histogram(&mut batch.gauges, name, hist),
            MetricView::Timer(timer) => self.append_timer(&mut batch.gauges, name, timer),
            MetricView::Healthcheck(_) => {
                tracing::trace!(metric = name, kind = %view.kind(), "skipping unreported metric");
            }
        }
    }

    fn append_histogram(
        &self,
        gauges: &mut Vec<Measurement>,
        name: &str,
        hist: &dyn DistributionView,
    ) {
        if hist.count() == 0 {
            return;
        }
        let summary = summarize(hist, self.options.sum_squares_fallback);
        gauges.push(Measurement::summary(format!("{name}.hist"), &summary, self.period));
        gauges.extend(self.options.percentiles.iter().map(|&p| {
            Measurement::value(histogram_percentile_name(name, p), hist.percentile(p), self.period)
        }));
    }

    fn append_timer(&self, gauges: &mut Vec<Measurement>, name: &str, timer: &dyn TimerView) {
        if timer.count() == 0 {
            return;
        }
        let summary = summarize(timer, self.options.sum_squares_fallback);
        gauges.push(
            Measurement::summary(format!("{name}.timer.mean"), &summary, self.period)
                .with_attributes(Attributes::nanos_as_millis()),
        );
        gauges.extend(self.options.percentiles.iter().map(|&p| {
            Measurement::value(timer_percentile_name(name, p), timer.percentile(p), self.period)
                .with_attributes(Attributes::nanos_as_millis())
        }));
        gauges.extend(rate_windows(timer).map(|(window, rate)| {
            Measurement::value(format!("{name}.rate.{window}"), rate, self.period)
                .with_attributes(Attributes::occurrences())
        }));
    }
}

/// `<name>.hist.<p with two decimals>`, e.g. `latency.hist.0.95`.
pub fn histogram_percentile_name(name: &str, p: f64) -> String {
    format!("{name}.hist.{p:.2}")
}

/// `<name>.timer.<p as whole percent>`, e.g. `latency.timer.95`.
pub fn timer_percentile_name(name: &str, p: f64) -> String {
    format!("{name}.timer.{:.0}", p * 100.0)
}

fn rate_windows<V: RatesView + ?Sized>(view: &V) -> [(&'static str, f64); 3] {
    [
        ("1min", view.rate1()),
        ("5min", view.rate5()),
        ("15min", view.rate15()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CounterView, GaugeView, HealthcheckView, MeterView, Registry};

    // ─── Synthetic registry ──────────────────────────────────────

    #[derive(Clone, Copy)]
    struct Dist {
        count: u64,
        mean: f64,
        std_dev: f64,
        min: f64,
        max: f64,
        rates: [f64; 3],
    }

    impl DistributionView for Dist {
        fn count(&self) -> u64 {
            self.count
        }
        fn mean(&self) -> f64 {
            self.mean
        }
        fn std_dev(&self) -> f64 {
            self.std_dev
        }
        fn min(&self) -> f64 {
            self.min
        }
        fn max(&self) -> f64 {
            self.max
        }
        /// Deterministic stand-in: the percentile scaled by 1000.
        fn percentile(&self, p: f64) -> f64 {
            p * 1000.0
        }
    }

    impl RatesView for Dist {
        fn rate1(&self) -> f64 {
            self.rates[0]
        }
        fn rate5(&self) -> f64 {
            self.rates[1]
        }
        fn rate15(&self) -> f64 {
            self.rates[2]
        }
    }

    struct Rates {
        count: u64,
        rates: [f64; 3],
    }

    impl RatesView for Rates {
        fn rate1(&self) -> f64 {
            self.rates[0]
        }
        fn rate5(&self) -> f64 {
            self.rates[1]
        }
        fn rate15(&self) -> f64 {
            self.rates[2]
        }
    }

    impl MeterView for Rates {
        fn count(&self) -> u64 {
            self.count
        }
    }

    struct Scalar(f64);

    impl CounterView for Scalar {
        fn count(&self) -> i64 {
            self.0 as i64
        }
    }

    impl GaugeView for Scalar {
        fn value(&self) -> f64 {
            self.0
        }
    }

    impl HealthcheckView for Scalar {
        fn error(&self) -> Option<String> {
            None
        }
    }

    enum Fake {
        Counter(Scalar),
        Gauge(Scalar),
        Histogram(Dist),
        Meter(Rates),
        Timer(Dist),
        Healthcheck(Scalar),
    }

    #[derive(Default)]
    struct FakeRegistry {
        entries: Vec<(String, Fake)>,
    }

    impl FakeRegistry {
        fn with(mut self, name: &str, metric: Fake) -> Self {
            self.entries.push((name.to_owned(), metric));
            self
        }
    }

    impl MetricsRegistry for FakeRegistry {
        fn each(&self, visit: &mut dyn FnMut(&str, MetricView<'_>)) {
            for (name, metric) in &self.entries {
                let view = match metric {
                    Fake::Counter(c) => MetricView::Counter(c),
                    Fake::Gauge(g) => MetricView::Gauge(g),
                    Fake::Histogram(h) => MetricView::Histogram(h),
                    Fake::Meter(m) => MetricView::Meter(m),
                    Fake::Timer(t) => MetricView::Timer(t),
                    Fake::Healthcheck(h) => MetricView::Healthcheck(h),
                };
                visit(name, view);
            }
        }
    }

    // ─── Helpers ─────────────────────────────────────────────────

    const NOW: i64 = 1_700_000_000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).expect("valid timestamp")
    }

    fn builder(percentiles: &[f64]) -> SnapshotBuilder {
        SnapshotBuilder::new(BuildOptions {
            interval: Duration::from_secs(60),
            source: "web-1".to_owned(),
            percentiles: percentiles.to_vec(),
            sum_squares_fallback: SumSquaresFallback::SquaredSum,
        })
    }

    fn dist(count: u64) -> Dist {
        Dist {
            count,
            mean: 10.0,
            std_dev: 0.0,
            min: 10.0,
            max: 10.0,
            rates: [3.0, 2.0, 1.0],
        }
    }

    fn names(measurements: &[Measurement]) -> Vec<&str> {
        measurements.iter().map(|m| m.name.as_str()).collect()
    }

    // ─── Per-kind output ─────────────────────────────────────────

    #[test]
    fn batch_carries_time_and_source() {
        let batch = builder(&[])
            .build(now(), &FakeRegistry::default())
            .expect("build");
        assert_eq!(batch.measure_time, NOW);
        assert_eq!(batch.source, "web-1");
        assert!(batch.is_empty());
    }

    #[test]
    fn counter_becomes_one_count_measurement() {
        let registry = FakeRegistry::default().with("jobs", Fake::Counter(Scalar(17.0)));
        let batch = builder(&[0.5]).build(now(), &registry).expect("build");

        assert!(batch.gauges.is_empty());
        assert_eq!(
            batch.counters,
            vec![Measurement::value("jobs.count", 17.0, Period::new(Duration::from_secs(60)))]
        );
    }

    #[test]
    fn gauge_passes_its_value_through() {
        let registry = FakeRegistry::default().with("queue.depth", Fake::Gauge(Scalar(-3.5)));
        let batch = builder(&[]).build(now(), &registry).expect("build");

        assert!(batch.counters.is_empty());
        assert_eq!(batch.gauges.len(), 1);
        assert_eq!(batch.gauges[0].name, "queue.depth");
        assert_eq!(batch.gauges[0].value, Some(-3.5));
    }

    #[test]
    fn meter_reports_count_and_three_rate_windows() {
        let registry = FakeRegistry::default().with(
            "requests",
            Fake::Meter(Rates {
                count: 42,
                rates: [1.5, 1.2, 1.0],
            }),
        );
        let batch = builder(&[0.99]).build(now(), &registry).expect("build");

        assert_eq!(batch.counters.len(), 1);
        assert_eq!(batch.counters[0].name, "requests");
        assert_eq!(batch.counters[0].value, Some(42.0));

        assert_eq!(
            names(&batch.gauges),
            vec!["requests.1min", "requests.5min", "requests.15min"]
        );
        let values: Vec<_> = batch.gauges.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![Some(1.5), Some(1.2), Some(1.0)]);
        for gauge in &batch.gauges {
            assert_eq!(gauge.period.as_secs_f64(), 60.0);
            assert_eq!(gauge.attributes, None);
        }
    }

    #[test]
    fn histogram_reports_summary_then_percentiles() {
        let registry = FakeRegistry::default().with("latency", Fake::Histogram(dist(3)));
        let batch = builder(&[0.5, 0.95]).build(now(), &registry).expect("build");

        assert!(batch.counters.is_empty());
        assert_eq!(
            names(&batch.gauges),
            vec!["latency.hist", "latency.hist.0.50", "latency.hist.0.95"]
        );

        let summary = &batch.gauges[0];
        assert_eq!(summary.value, None);
        assert_eq!(summary.count, Some(3));
        assert_eq!(summary.sum, Some(30.0));
        assert_eq!(summary.sum_squares, Some(300.0));
        assert_eq!(summary.min, Some(10.0));
        assert_eq!(summary.max, Some(10.0));
        assert_eq!(summary.attributes, None);

        assert_eq!(batch.gauges[1].value, Some(500.0));
        assert_eq!(batch.gauges[2].value, Some(0.95 * 1000.0));
        assert_eq!(batch.gauges[2].period, summary.period);
    }

    #[test]
    fn empty_percentile_list_reports_summary_only() {
        let registry = FakeRegistry::default()
            .with("h", Fake::Histogram(dist(5)))
            .with("t", Fake::Timer(dist(5)));
        let batch = builder(&[]).build(now(), &registry).expect("build");

        assert_eq!(
            names(&batch.gauges),
            vec!["h.hist", "t.timer.mean", "t.rate.1min", "t.rate.5min", "t.rate.15min"]
        );
    }

    #[test]
    fn timer_reports_summary_percentiles_and_rates() {
        let registry = FakeRegistry::default().with("db.query", Fake::Timer(dist(3)));
        let batch = builder(&[0.5, 0.999]).build(now(), &registry).expect("build");

        assert!(batch.counters.is_empty());
        assert_eq!(
            names(&batch.gauges),
            vec![
                "db.query.timer.mean",
                "db.query.timer.50",
                "db.query.timer.100",
                "db.query.rate.1min",
                "db.query.rate.5min",
                "db.query.rate.15min",
            ]
        );

        let millis = Some(Attributes::nanos_as_millis());
        assert_eq!(batch.gauges[0].count, Some(3));
        assert_eq!(batch.gauges[0].sum, Some(30.0));
        assert_eq!(batch.gauges[0].attributes, millis);
        assert_eq!(batch.gauges[1].attributes, millis);
        assert_eq!(batch.gauges[2].attributes, millis);

        let occurrences = Some(Attributes::occurrences());
        for (gauge, rate) in batch.gauges[3..].iter().zip([3.0, 2.0, 1.0]) {
            assert_eq!(gauge.value, Some(rate));
            assert_eq!(gauge.attributes, occurrences);
        }
    }

    #[test]
    fn percentile_names_differ_between_histograms_and_timers() {
        let registry = FakeRegistry::default().with("latency", Fake::Histogram(dist(1)));
        let batch = builder(&[0.95]).build(now(), &registry).expect("build");
        assert!(batch.find("latency.hist.0.95").is_some());

        let registry = FakeRegistry::default().with("latency", Fake::Timer(dist(1)));
        let batch = builder(&[0.95]).build(now(), &registry).expect("build");
        assert!(batch.find("latency.timer.95").is_some());
    }

    #[test]
    fn empty_distributions_emit_nothing() {
        let registry = FakeRegistry::default()
            .with("idle.hist", Fake::Histogram(dist(0)))
            .with("idle.timer", Fake::Timer(dist(0)));
        let batch = builder(&[0.5, 0.95, 0.99]).build(now(), &registry).expect("build");
        assert!(batch.is_empty());
    }

    #[test]
    fn unreported_kinds_are_skipped() {
        let registry = FakeRegistry::default()
            .with("db.health", Fake::Healthcheck(Scalar(0.0)))
            .with("jobs", Fake::Counter(Scalar(1.0)));
        let batch = builder(&[]).build(now(), &registry).expect("build");
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn every_measurement_carries_the_interval() {
        let registry = FakeRegistry::default()
            .with("c", Fake::Counter(Scalar(1.0)))
            .with("g", Fake::Gauge(Scalar(1.0)))
            .with("h", Fake::Histogram(dist(2)))
            .with("m", Fake::Meter(Rates { count: 1, rates: [0.0; 3] }))
            .with("t", Fake::Timer(dist(2)));
        let batch = builder(&[0.75]).build(now(), &registry).expect("build");

        assert_eq!(batch.len(), 1 + 1 + 2 + 4 + 5);
        for m in batch.counters.iter().chain(&batch.gauges) {
            assert!(!m.name.is_empty());
            assert_eq!(m.period.as_secs_f64(), 60.0);
        }
    }

    #[test]
    fn non_finite_gauges_are_dropped() {
        let registry = FakeRegistry::default()
            .with("ratio", Fake::Gauge(Scalar(f64::NAN)))
            .with("overflow", Fake::Gauge(Scalar(f64::INFINITY)))
            .with("underflow", Fake::Gauge(Scalar(f64::NEG_INFINITY)))
            .with("depth", Fake::Gauge(Scalar(2.0)))
            .with("jobs", Fake::Counter(Scalar(1.0)));
        let batch = builder(&[]).build(now(), &registry).expect("build");

        assert_eq!(names(&batch.gauges), vec!["depth"]);
        assert_eq!(batch.counters.len(), 1);
        let json = serde_json::to_string(&batch).expect("serialize");
        assert!(!json.contains("null"), "{json}");
    }

    // ─── Malformed registries ────────────────────────────────────

    #[test]
    fn empty_name_aborts_the_batch() {
        let registry = FakeRegistry::default()
            .with("ok", Fake::Counter(Scalar(1.0)))
            .with("", Fake::Gauge(Scalar(1.0)));
        let err = builder(&[]).build(now(), &registry).expect_err("empty name");
        assert_eq!(err, BuildError::EmptyName);
    }

    #[test]
    fn repeated_name_aborts_the_batch() {
        let registry = FakeRegistry::default()
            .with("dup", Fake::Counter(Scalar(1.0)))
            .with("dup", Fake::Gauge(Scalar(1.0)));
        let err = builder(&[]).build(now(), &registry).expect_err("duplicate");
        assert_eq!(
            err,
            BuildError::DuplicateName {
                name: "dup".to_owned()
            }
        );
    }

    // ─── Live registry ───────────────────────────────────────────

    #[test]
    fn builds_from_a_live_registry() {
        let registry = Registry::new();
        registry.get_or_register_counter("jobs").expect("counter").inc(4);
        let hist = registry.get_or_register_histogram("size").expect("histogram");
        for v in [10, 10, 10] {
            hist.update(v);
        }
        registry.get_or_register_timer("idle").expect("timer");
        registry
            .register_healthcheck("db", || Ok(()))
            .expect("healthcheck");

        let batch = builder(&[0.5]).build(now(), &registry).expect("build");

        let jobs = batch.find("jobs.count").expect("counter measurement");
        assert_eq!(jobs.value, Some(4.0));
        let size = batch.find("size.hist").expect("histogram summary");
        assert_eq!(size.count, Some(3));
        assert_eq!(size.sum, Some(30.0));
        assert_eq!(size.sum_squares, Some(300.0));
        assert_eq!(batch.find("size.hist.0.50").and_then(|m| m.value), Some(10.0));
        assert!(batch.find("idle.timer.mean").is_none());
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn live_timer_reports_exact_extremes() {
        let registry = Registry::new();
        let timer = registry.get_or_register_timer("db.query").expect("timer");
        for nanos in [250_111, 1_234_567, 250_111, 640_003] {
            timer.update(Duration::from_nanos(nanos));
        }

        let batch = builder(&[0.5]).build(now(), &registry).expect("build");

        let summary = batch.find("db.query.timer.mean").expect("timer summary");
        assert_eq!(summary.count, Some(4));
        assert_eq!(summary.min, Some(250_111.0));
        assert_eq!(summary.max, Some(1_234_567.0));
    }
}
