use serde::Serialize;

use super::measurement::Measurement;

/// One tick's worth of measurements, in the shape the Librato metrics API
/// expects. Built once, handed to a submitter by value, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    /// Unix seconds at capture time.
    pub measure_time: i64,
    pub source: String,
    pub counters: Vec<Measurement>,
    pub gauges: Vec<Measurement>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.counters.len() + self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty()
    }

    /// Find a measurement by name in either collection.
    pub fn find(&self, name: &str) -> Option<&Measurement> {
        self.counters
            .iter()
            .chain(&self.gauges)
            .find(|m| m.name == name)
    }
}
