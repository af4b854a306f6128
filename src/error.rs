use thiserror::Error;

use crate::registry::MetricKind;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Metric name must not be empty.")]
    EmptyName,
    #[error("Metric '{name}' is registered as a {registered}, not a {requested}.")]
    KindMismatch {
        name: String,
        registered: MetricKind,
        requested: MetricKind,
    },
    #[error("Failed to create histogram: {source}")]
    Histogram {
        #[source]
        source: hdrhistogram::CreationError,
    },
}

/// Malformed registry state that prevents a batch from being built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Registry yielded a metric with an empty name.")]
    EmptyName,
    #[error("Registry yielded metric '{name}' more than once.")]
    DuplicateName { name: String },
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Librato rejected batch with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Failed to encode batch: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

/// Why a single reporting tick produced no submission.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to build batch: {0}")]
    Build(#[from] BuildError),
    #[error("Failed to submit batch: {0}")]
    Submit(#[from] SubmissionError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Reporting interval must be at least one second.")]
    IntervalTooShort,
    #[error("Source label must not be empty.")]
    EmptySource,
    #[error("Invalid percentile '{value}': expected a number between 0 and 1.")]
    InvalidPercentile { value: String },
    #[error("Librato email and token must be given together.")]
    PartialCredentials,
    #[error("Request timeout must be greater than zero.")]
    ZeroRequestTimeout,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("Failed to bind preview server to {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Preview server exited with error: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}
