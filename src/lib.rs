//! Periodic Librato reporter for an in-process metrics registry.
//!
//! Once per interval the [`reporter::Reporter`] asks the
//! [`librato::SnapshotBuilder`] to walk a [`registry::MetricsRegistry`] and
//! turn every counter, gauge, histogram, meter and timer into Librato
//! measurements, then hands the resulting [`librato::Batch`] to a
//! [`librato::Submit`] implementation.

pub mod config;
pub mod error;
pub mod librato;
pub mod logger;
pub mod registry;
pub mod reporter;

pub use error::{BuildError, ConfigError, RegistryError, ReportError, SubmissionError};
pub use reporter::Reporter;
