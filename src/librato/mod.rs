//! Librato batch model, the snapshot builder and the submission client.
pub mod batch;
pub mod builder;
pub mod client;
pub mod measurement;
pub mod summary;

pub use batch::Batch;
pub use builder::{BuildOptions, SnapshotBuilder};
pub use client::{Credentials, LibratoClient, LogSubmitter, Submit, DEFAULT_ENDPOINT};
pub use measurement::{Attributes, Measurement, Period};
pub use summary::{summarize, sum_squares, Summary, SumSquaresFallback};
