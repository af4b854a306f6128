use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;
use crate::librato::{BuildOptions, Credentials, SumSquaresFallback, DEFAULT_ENDPOINT};

/// Command-line / environment surface of the reporter binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "librato-reporter", version, about = "Report in-process metrics to Librato")]
pub struct ReporterArgs {
    /// Reporting interval in seconds
    #[arg(long, env = "LIBRATO_INTERVAL", default_value_t = 60)]
    pub interval: u64,

    /// Source label attached to every batch (usually the host name)
    #[arg(long, env = "LIBRATO_SOURCE", default_value = "localhost")]
    pub source: String,

    /// Percentiles reported for histograms and timers, as fractions
    #[arg(
        long,
        env = "LIBRATO_PERCENTILES",
        value_delimiter = ',',
        default_value = "0.5,0.95,0.99"
    )]
    pub percentiles: Vec<f64>,

    /// Librato account email; without it batches are only logged
    #[arg(long, env = "LIBRATO_EMAIL")]
    pub email: Option<String>,

    /// Librato API token
    #[arg(long, env = "LIBRATO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, env = "LIBRATO_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Submission request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub request_timeout: u64,

    /// Sum of squares reported when the reconstruction is not finite
    #[arg(long, value_enum, default_value_t = SumSquaresFallback::SquaredSum)]
    pub sum_squares_fallback: SumSquaresFallback,

    /// Address of the local preview server
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Synthetic load workers feeding the registry (0 disables)
    #[arg(long, default_value_t = 4)]
    pub demo_workers: u32,

    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated reporter settings.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub build: BuildOptions,
    /// `None` means dry run.
    pub credentials: Option<Credentials>,
    pub endpoint: String,
    pub request_timeout: Duration,
    pub listen: SocketAddr,
    pub demo_workers: u32,
}

impl ReporterArgs {
    /// # Errors
    ///
    /// Returns an error if any setting is out of range or only half of the
    /// credential pair is present.
    pub fn into_config(self) -> Result<ReporterConfig, ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::IntervalTooShort);
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        let source = self.source.trim().to_owned();
        if source.is_empty() {
            return Err(ConfigError::EmptySource);
        }
        if let Some(bad) = self
            .percentiles
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(ConfigError::InvalidPercentile {
                value: bad.to_string(),
            });
        }

        let credentials = match (self.email, self.token) {
            (Some(email), Some(token)) => Some(Credentials { email, token }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialCredentials),
        };

        Ok(ReporterConfig {
            build: BuildOptions {
                interval: Duration::from_secs(self.interval),
                source,
                percentiles: self.percentiles,
                sum_squares_fallback: self.sum_squares_fallback,
            },
            credentials,
            endpoint: self.endpoint,
            request_timeout: Duration::from_secs(self.request_timeout),
            listen: self.listen,
            demo_workers: self.demo_workers,
        })
    }
}
