use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use librato_reporter::config::ReporterArgs;
use librato_reporter::error::AppError;
use librato_reporter::librato::{LibratoClient, LogSubmitter, SnapshotBuilder, Submit};
use librato_reporter::logger::init_logging;
use librato_reporter::registry::{Counter, Registry, Timer};
use librato_reporter::{RegistryError, Reporter};

mod load_generator;
mod middleware;
mod preview;
mod server;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Registry the reporter walks; the preview endpoints walk it too.
    pub registry: Arc<Registry>,

    /// Same builder settings the reporter uses, so previews match submissions.
    pub builder: SnapshotBuilder,

    /// Preview request latency, recorded by the timing middleware.
    pub http_requests: Arc<Timer>,

    /// Preview responses with a 5xx status.
    pub http_server_errors: Arc<Counter>,

    /// Cleared on shutdown; checked by load workers and SSE streams.
    pub running: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, builder: SnapshotBuilder) -> Result<Self, RegistryError> {
        Ok(Self {
            http_requests: registry.get_or_register_timer("http.requests")?,
            http_server_errors: registry.get_or_register_counter("http.responses.5xx")?,
            registry,
            builder,
            running: Arc::new(AtomicBool::new(true)),
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = ReporterArgs::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "librato-reporter failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: ReporterArgs) -> Result<(), AppError> {
    let config = args.into_config()?;

    // ── 1. Registry & shared state ───────────────────────────────
    let registry = Arc::new(Registry::new());
    let builder = SnapshotBuilder::new(config.build.clone());
    let state = Arc::new(AppState::new(registry.clone(), builder.clone())?);

    // ── 2. Submission boundary ───────────────────────────────────
    let submitter: Arc<dyn Submit> = match config.credentials.clone() {
        Some(credentials) => {
            let client =
                LibratoClient::new(config.endpoint.clone(), credentials, config.request_timeout)?;
            tracing::info!(endpoint = client.endpoint(), "submitting to Librato");
            Arc::new(client)
        }
        None => {
            tracing::warn!("no Librato credentials configured; batches will only be logged");
            Arc::new(LogSubmitter)
        }
    };

    // ── 3. Shutdown fan-out ──────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    {
        let shutdown_tx = shutdown_tx.clone();
        let running = state.running.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(%err, "failed to listen for ctrl-c");
                return;
            }
            tracing::info!("shutdown requested");
            running.store(false, Ordering::SeqCst);
            if shutdown_tx.send(()).is_err() {
                tracing::debug!("no shutdown listeners left");
            }
        });
    }

    // ── 4. Reporter ──────────────────────────────────────────────
    let reporter = Reporter::new(builder, registry.clone(), submitter);
    let reporter_handle = tokio::spawn(reporter.run(shutdown_tx.subscribe()));

    // ── 5. Synthetic load ────────────────────────────────────────
    let load_handle = if config.demo_workers > 0 {
        let instruments = Arc::new(load_generator::Instruments::register(&registry)?);
        tracing::info!(workers = config.demo_workers, "starting synthetic load");
        Some(tokio::spawn(load_generator::run(
            state.running.clone(),
            instruments,
            config.demo_workers,
        )))
    } else {
        None
    };

    // ── 6. Preview server ────────────────────────────────────────
    let app = server::create_router(state);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .map_err(|source| AppError::Bind {
            addr: config.listen,
            source,
        })?;

    tracing::info!("preview batch   → http://{}/api/metrics", config.listen);
    tracing::info!("preview stream  → http://{}/api/metrics/stream", config.listen);

    let mut server_shutdown = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if server_shutdown.recv().await.is_err() {
                tracing::debug!("shutdown channel closed");
            }
        })
        .await
        .map_err(|source| AppError::Serve { source })?;

    // ── 7. Drain background tasks ────────────────────────────────
    if let Err(err) = reporter_handle.await {
        tracing::warn!(%err, "reporter task ended abnormally");
    }
    if let Some(handle) = load_handle {
        if let Err(err) = handle.await {
            tracing::warn!(%err, "load generator ended abnormally");
        }
    }

    Ok(())
}
