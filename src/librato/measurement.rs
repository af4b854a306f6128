use std::time::Duration;

use serde::{Serialize, Serializer};

use super::summary::Summary;

/// A single named statistic in a Librato batch.
///
/// Optional fields are `None` when they do not apply and are left out of
/// the JSON entirely; `Some(0.0)` is sent as a real zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum_squares: Option<f64>,
    pub period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

impl Measurement {
    /// A plain single-value measurement.
    pub fn value(name: impl Into<String>, value: f64, period: Period) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            count: None,
            sum: None,
            min: None,
            max: None,
            sum_squares: None,
            period,
            attributes: None,
        }
    }

    /// A complex measurement carrying a distribution summary instead of a value.
    pub fn summary(name: impl Into<String>, summary: &Summary, period: Period) -> Self {
        Self {
            name: name.into(),
            value: None,
            count: Some(summary.count),
            sum: Some(summary.sum),
            min: Some(summary.min),
            max: Some(summary.max),
            sum_squares: Some(summary.sum_squares),
            period,
            attributes: None,
        }
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// Display hints Librato applies when charting a metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_transform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_units_long: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_units_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_min: Option<f64>,
}

impl Attributes {
    /// Raw values are nanoseconds; charts show milliseconds.
    pub fn nanos_as_millis() -> Self {
        Self {
            display_transform: Some("x/1000000".to_owned()),
            display_units_long: Some("milliseconds".to_owned()),
            display_units_short: Some("ms".to_owned()),
            display_min: None,
        }
    }

    /// Event rates, never charted below zero.
    pub fn occurrences() -> Self {
        Self {
            display_transform: None,
            display_units_long: Some("occurrences".to_owned()),
            display_units_short: Some("occ".to_owned()),
            display_min: Some(0.0),
        }
    }
}

/// Reporting period. Serialized as whole seconds when the interval is a
/// whole number of seconds, fractional seconds otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period(Duration);

impl Period {
    pub fn new(interval: Duration) -> Self {
        Self(interval)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }
}

impl From<Duration> for Period {
    fn from(interval: Duration) -> Self {
        Self(interval)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.subsec_nanos() == 0 {
            serializer.serialize_u64(self.0.as_secs())
        } else {
            serializer.serialize_f64(self.0.as_secs_f64())
        }
    }
}
