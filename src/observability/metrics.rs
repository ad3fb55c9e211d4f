//! Prometheus metrics for the deletion pipeline.
//!
//! Provides metrics for:
//! - Query pages fetched and dropped
//! - Batch delete outcomes and deleted record counts
//! - Run outcomes and durations
//! - Queue operations

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Initialize the metrics system with the given configuration.
///
/// With a `listen_addr` the exporter serves `/metrics` itself; otherwise
/// only the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &seconds_from_ms(&config.latency_buckets_ms),
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    match config.listen_addr {
        Some(addr) => {
            builder.with_http_listener(addr).install()?;
            tracing::info!(address = %addr, "Prometheus exporter listening");
        }
        None => {
            builder.install_recorder()?;
        }
    }

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        tracing::warn!(
            "Metrics are enabled in config but the 'prometheus' feature is not compiled. \
            Rebuild with: cargo build --features prometheus"
        );
    }
    Ok(())
}

/// Convert millisecond buckets to seconds.
#[cfg(feature = "prometheus")]
fn seconds_from_ms(ms_buckets: &[f64]) -> Vec<f64> {
    ms_buckets.iter().map(|ms| ms / 1000.0).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record a fetched query page.
///
/// # Arguments
/// * `backend` - Store backend name
/// * `decoded` - Whether the page payload decoded; dropped pages count as false
pub fn record_page_fetched(backend: &str, decoded: bool) {
    #[cfg(feature = "prometheus")]
    {
        counter!("purge_pages_fetched_total", "backend" => backend.to_string())
            .increment(1);
        if !decoded {
            counter!("purge_pages_dropped_total", "backend" => backend.to_string())
                .increment(1);
        }
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (backend, decoded);
    }
}

/// Record one batch delete attempt.
///
/// # Arguments
/// * `outcome` - "success", "validation_error" or "error"
/// * `records` - Number of keys in the batch
/// * `duration_secs` - Time spent in the store call
pub fn record_batch_delete(outcome: &str, records: u64, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("purge_batches_total", "outcome" => outcome.to_string()).increment(1);
        histogram!("purge_batch_duration_seconds").record(duration_secs);
        if outcome == "success" {
            counter!("purge_records_deleted_total").increment(records);
        }
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (outcome, records, duration_secs);
    }
}

/// Record a finished account deletion run.
///
/// # Arguments
/// * `outcome` - "complete", "partial", "failed" or "cancelled"
/// * `duration_secs` - Wall time of the run
pub fn record_purge_run(outcome: &str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("purge_runs_total", "outcome" => outcome.to_string()).increment(1);
        histogram!("purge_run_duration_seconds", "outcome" => outcome.to_string())
            .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (outcome, duration_secs);
    }
}

/// Record a queue operation.
///
/// # Arguments
/// * `operation` - "received", "empty", "acknowledged", "sent" or "error"
pub fn record_queue_message(operation: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("purge_queue_messages_total", "operation" => operation.to_string())
            .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = operation;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
