use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global `tracing` subscriber.
///
/// `LIBRATO_LOG` wins over `RUST_LOG`; without either the level is `info`,
/// or `debug` when `verbose` is set.
pub fn init_logging(verbose: bool) {
    let filter = select_filter(
        std::env::var("LIBRATO_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
        verbose,
    );

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}

fn select_filter(librato_log: Option<String>, rust_log: Option<String>, verbose: bool) -> EnvFilter {
    match librato_log.or(rust_log) {
        Some(value) => EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        None if verbose => EnvFilter::new("debug"),
        None => EnvFilter::new("info"),
    }
}
