use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine operations. Labels: op, status.
pub const OPERATIONS_TOTAL: &str = "confbook_operations_total";

/// Histogram: operation latency in seconds. Labels: op.
pub const OPERATION_DURATION_SECONDS: &str = "confbook_operation_duration_seconds";

// ── Domain counters ─────────────────────────────────────────────

pub const BOOKINGS_CREATED_TOTAL: &str = "confbook_bookings_created_total";
pub const BOOKINGS_UPDATED_TOTAL: &str = "confbook_bookings_updated_total";
pub const BOOKINGS_CANCELLED_TOTAL: &str = "confbook_bookings_cancelled_total";

/// Counter: rejected windows. Labels: resource.
pub const CONFLICTS_TOTAL: &str = "confbook_conflicts_total";

/// Counter: registrations. Labels: outcome.
pub const REGISTRATIONS_TOTAL: &str = "confbook_registrations_total";

// ── Journal ─────────────────────────────────────────────────────

/// Histogram: group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "confbook_journal_flush_duration_seconds";

/// Histogram: events per group-commit flush.
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "confbook_journal_flush_batch_size";

pub const JOURNAL_COMPACTIONS_TOTAL: &str = "confbook_journal_compactions_total";

/// Install a `fmt` subscriber driven by `RUST_LOG`, unless the host already set one.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn install_metrics_exporter(
    port: Option<u16>,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Run one engine operation, recording its outcome and latency.
pub(crate) async fn track<T>(
    op: &'static str,
    fut: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    let started = Instant::now();
    let result = fut.await;
    let status = match &result {
        Ok(_) => "ok",
        Err(e) => {
            tracing::debug!(op, error = %e, "rejected");
            e.label()
        }
    };
    metrics::counter!(OPERATIONS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
    result
}
