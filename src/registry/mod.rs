//! In-process metrics registry.
//!
//! Instrumented code registers and updates named instruments; the reporter
//! walks them through the [`MetricsRegistry`] trait once per tick.

mod counter;
mod healthcheck;
mod histogram;
mod meter;
mod timer;
mod view;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::RegistryError;

pub use counter::{Counter, Gauge};
pub use healthcheck::Healthcheck;
pub use histogram::{Histogram, HistogramSnapshot};
pub use meter::{Meter, MeterSnapshot};
pub use timer::{Timer, TimerSnapshot};
pub use view::{
    CounterView, DistributionView, GaugeView, HealthcheckView, MeterView, MetricKind,
    MetricView, MetricsRegistry, RatesView, TimerView,
};

/// A registered instrument. Cloning shares the instrument.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Histogram(Arc<Histogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
    Healthcheck(Arc<Healthcheck>),
}

impl Metric {
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

/// Thread-safe name → instrument map.
#[derive(Debug, Default)]
pub struct Registry {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_register_counter(&self, name: &str) -> Result<Arc<Counter>, RegistryError> {
        self.get_or_register(
            name,
            MetricKind::Counter,
            |m| match m {
                Metric::Counter(c) => Some(Arc::clone(c)),
                _ => None,
            },
            || Ok(Metric::Counter(Arc::new(Counter::new()))),
        )
    }

    pub fn get_or_register_gauge(&self, name: &str) -> Result<Arc<Gauge>, RegistryError> {
        self.get_or_register(
            name,
            MetricKind::Gauge,
            |m| match m {
                Metric::Gauge(g) => Some(Arc::clone(g)),
                _ => None,
            },
            || Ok(Metric::Gauge(Arc::new(Gauge::new()))),
        )
    }

    pub fn get_or_register_histogram(
        &self,
        name: &str,
    ) -> Result<Arc<Histogram>, RegistryError> {
        self.get_or_register(
            name,
            MetricKind::Histogram,
            |m| match m {
                Metric::Histogram(h) => Some(Arc::clone(h)),
                _ => None,
            },
            || Ok(Metric::Histogram(Arc::new(Histogram::new()?))),
        )
    }

    pub fn get_or_register_meter(&self, name: &str) -> Result<Arc<Meter>, RegistryError> {
        self.get_or_register(
            name,
            MetricKind::Meter,
            |m| match m {
                Metric::Meter(m) => Some(Arc::clone(m)),
                _ => None,
            },
            || Ok(Metric::Meter(Arc::new(Meter::new()))),
        )
    }

    pub fn get_or_register_timer(&self, name: &str) -> Result<Arc<Timer>, RegistryError> {
        self.get_or_register(
            name,
            MetricKind::Timer,
            |m| match m {
                Metric::Timer(t) => Some(Arc::clone(t)),
                _ => None,
            },
            || Ok(Metric::Timer(Arc::new(Timer::new()?))),
        )
    }

    /// Register a health check, replacing any check of the same name.
    pub fn register_healthcheck(
        &self,
        name: &str,
        check: impl Fn() -> Result<(), String> + Send + Sync + 'static,
    ) -> Result<Arc<Healthcheck>, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut metrics = self.metrics.write();
        if let Some(existing) = metrics.get(name) {
            if existing.kind() != MetricKind::Healthcheck {
                return Err(RegistryError::KindMismatch {
                    name: name.to_owned(),
                    registered: existing.kind(),
                    requested: MetricKind::Healthcheck,
                });
            }
        }
        let healthcheck = Arc::new(Healthcheck::new(check));
        metrics.insert(name.to_owned(), Metric::Healthcheck(Arc::clone(&healthcheck)));
        Ok(healthcheck)
    }

    /// Run every registered health check.
    pub fn run_healthchecks(&self) {
        let checks: Vec<Arc<Healthcheck>> = self
            .metrics
            .read()
            .values()
            .filter_map(|metric| match metric {
                Metric::Healthcheck(h) => Some(Arc::clone(h)),
                _ => None,
            })
            .collect();
        for check in checks {
            check.check();
        }
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.read().get(name).cloned()
    }

    pub fn unregister(&self, name: &str) -> Option<Metric> {
        self.metrics.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    fn get_or_register<T>(
        &self,
        name: &str,
        requested: MetricKind,
        extract: fn(&Metric) -> Option<Arc<T>>,
        create: impl FnOnce() -> Result<Metric, RegistryError>,
    ) -> Result<Arc<T>, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        // Fast path: already registered
        if let Some(existing) = self.metrics.read().get(name) {
            return extract(existing).ok_or_else(|| RegistryError::KindMismatch {
                name: name.to_owned(),
                registered: existing.kind(),
                requested,
            });
        }

        // Another thread may have registered it between the two locks
        let mut metrics = self.metrics.write();
        let metric = match metrics.entry(name.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(create()?),
        };
        let metric = &*metric;
        extract(metric).ok_or_else(|| RegistryError::KindMismatch {
            name: name.to_owned(),
            registered: metric.kind(),
            requested,
        })
    }
}

impl MetricsRegistry for Registry {
    fn each(&self, visit: &mut dyn FnMut(&str, MetricView<'_>)) {
        // Copy the entry list so no lock is held while visiting.
        let entries: Vec<(String, Metric)> = self
            .metrics
            .read()
            .iter()
            .map(|(name, metric)| (name.clone(), metric.clone()))
            .collect();

        for (name, metric) in &entries {
            match metric {
                Metric::Counter(c) => visit(name, MetricView::Counter(c.as_ref())),
                Metric::Gauge(g) => visit(name, MetricView::Gauge(g.as_ref())),
                Metric::Histogram(h) => {
                    let snapshot = h.snapshot();
                    visit(name, MetricView::Histogram(&snapshot));
                }
                Metric::Meter(m) => {
                    let snapshot = m.snapshot();
                    visit(name, MetricView::Meter(&snapshot));
                }
                Metric::Timer(t) => {
                    let snapshot = t.snapshot();
                    visit(name, MetricView::Timer(&snapshot));
                }
                Metric::Healthcheck(h) => visit(name, MetricView::Healthcheck(h.as_ref())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_register_returns_the_same_instrument() {
        let registry = Registry::new();
        let a = registry.get_or_register_counter("jobs").expect("register");
        let b = registry.get_or_register_counter("jobs").expect("lookup");
        a.inc(3);
        assert_eq!(b.count(), 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_kind_mismatch() {
        let registry = Registry::new();
        registry.get_or_register_gauge("depth").expect("register");
        let err = registry
            .get_or_register_timer("depth")
            .expect_err("timer over gauge");
        match err {
            RegistryError::KindMismatch {
                registered,
                requested,
                ..
            } => {
                assert_eq!(registered, MetricKind::Gauge);
                assert_eq!(requested, MetricKind::Timer);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_empty_names() {
        let registry = Registry::new();
        assert!(matches!(
            registry.get_or_register_meter(""),
            Err(RegistryError::EmptyName)
        ));
        assert!(matches!(
            registry.register_healthcheck("", || Ok(())),
            Err(RegistryError::EmptyName)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn each_visits_every_entry_with_its_kind() {
        let registry = Registry::new();
        registry.get_or_register_counter("c").expect("counter");
        registry.get_or_register_gauge("g").expect("gauge");
        registry.get_or_register_histogram("h").expect("histogram");
        registry.get_or_register_meter("m").expect("meter");
        registry.get_or_register_timer("t").expect("timer");
        registry
            .register_healthcheck("db", || Err("down".to_owned()))
            .expect("healthcheck");

        let mut seen = Vec::new();
        registry.each(&mut |name, view| seen.push((name.to_owned(), view.kind())));
        seen.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            seen,
            vec![
                ("c".to_owned(), MetricKind::Counter),
                ("db".to_owned(), MetricKind::Healthcheck),
                ("g".to_owned(), MetricKind::Gauge),
                ("h".to_owned(), MetricKind::Histogram),
                ("m".to_owned(), MetricKind::Meter),
                ("t".to_owned(), MetricKind::Timer),
            ]
        );
    }

    #[test]
    fn each_tolerates_registration_during_visit() {
        let registry = Registry::new();
        registry.get_or_register_counter("a").expect("counter");
        let mut visits = 0;
        registry.each(&mut |_, _| {
            visits += 1;
            registry.get_or_register_counter("b").expect("nested register");
        });
        assert_eq!(visits, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn healthchecks_record_last_outcome() {
        let registry = Registry::new();
        let check = registry
            .register_healthcheck("db", || Err("connection refused".to_owned()))
            .expect("healthcheck");
        assert_eq!(check.error(), None);
        registry.run_healthchecks();
        assert_eq!(check.error().as_deref(), Some("connection refused"));
        assert!(registry.unregister("db").is_some());
        assert!(registry.get("db").is_none());
    }
}
