use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use librato_reporter::registry::{Counter, Gauge, Histogram, Meter, Registry, Timer};
use librato_reporter::RegistryError;

/// Share of simulated jobs that fail.
const FAILURE_RATE: f64 = 0.02;

// ─── Instruments ─────────────────────────────────────────────────

/// One of each metric kind, so every branch of the reporter has data.
pub struct Instruments {
    jobs: Arc<Counter>,
    failures: Arc<Counter>,
    queue_depth: Arc<Gauge>,
    payload_bytes: Arc<Histogram>,
    throughput: Arc<Meter>,
    latency: Arc<Timer>,
}

impl Instruments {
    pub fn register(registry: &Registry) -> Result<Self, RegistryError> {
        Ok(Self {
            jobs: registry.get_or_register_counter("demo.jobs")?,
            failures: registry.get_or_register_counter("demo.jobs.failed")?,
            queue_depth: registry.get_or_register_gauge("demo.queue.depth")?,
            payload_bytes: registry.get_or_register_histogram("demo.payload.bytes")?,
            throughput: registry.get_or_register_meter("demo.throughput")?,
            latency: registry.get_or_register_timer("demo.job")?,
        })
    }
}

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that simulate work until the
/// `running` flag is set to false.
pub async fn run(running: Arc<AtomicBool>, instruments: Arc<Instruments>, concurrency: u32) {
    let mut handles = Vec::with_capacity(concurrency as usize);

    for worker_id in 0..concurrency {
        let running = running.clone();
        let instruments = instruments.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, running, instruments).await;
        }));
    }

    // Wait for all workers to finish
    for h in handles {
        if let Err(err) = h.await {
            tracing::warn!(%err, "load worker ended abnormally");
        }
    }
    tracing::info!(concurrency, "load generator stopped");
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(id: u32, running: Arc<AtomicBool>, instruments: Arc<Instruments>) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while running.load(Ordering::Relaxed) {
        let t0 = Instant::now();
        let work = Duration::from_micros(rng.gen_range(500..20_000));
        tokio::time::sleep(work).await;

        instruments.latency.update_since(t0);
        instruments.throughput.mark(1);
        instruments.jobs.inc(1);
        instruments
            .payload_bytes
            .update(rng.gen_range(200..64_000));
        instruments.queue_depth.update(rng.gen_range(0.0..50.0));
        if rng.gen_bool(FAILURE_RATE) {
            instruments.failures.inc(1);
        }
    }
}
