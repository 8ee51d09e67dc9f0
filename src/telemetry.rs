//! Telemetry and structured logging for exports.

use crate::job::{ExportJob, ExportState};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use tracing::{info, warn};

/// Exports slower than this are flagged.
const SLOW_EXPORT_MS: i64 = 5000;

/// Records a span and structured log line for a finished export.
///
/// Attributes include duration, status, raster size, link count and the
/// error message of failed exports.
pub fn record_export_telemetry(job: &ExportJob) {
    let tracer = global::tracer("itinerary-export");
    let mut span = tracer.start("pdf_snapshot_export");

    span.set_attribute(KeyValue::new("job_id", job.job_id.clone()));
    span.set_attribute(KeyValue::new("basename", job.basename.clone()));
    span.set_attribute(KeyValue::new("status", job.status.to_string()));
    span.set_attribute(KeyValue::new("scale", job.scale as f64));
    span.set_attribute(KeyValue::new("link_count", job.link_count as i64));

    if let (Some(width), Some(height)) = (job.pixel_width, job.pixel_height) {
        span.set_attribute(KeyValue::new("pixel_width", width as i64));
        span.set_attribute(KeyValue::new("pixel_height", height as i64));
    }

    if let Some(duration_ms) = job.processing_duration_ms() {
        span.set_attribute(KeyValue::new("duration_ms", duration_ms));

        info!(
            job_id = %job.job_id,
            basename = %job.basename,
            duration_ms = duration_ms,
            links = job.link_count,
            status = %job.status,
            "PDF snapshot export finished"
        );

        if duration_ms > SLOW_EXPORT_MS {
            warn!(
                job_id = %job.job_id,
                duration_ms = duration_ms,
                "PDF snapshot export exceeded performance threshold ({}ms)",
                SLOW_EXPORT_MS
            );
        }
    }

    if job.status == ExportState::Failed {
        if let Some(ref error) = job.error {
            span.set_attribute(KeyValue::new("error", error.clone()));
            warn!(job_id = %job.job_id, error = %error, "PDF snapshot export failed");
        }
    }

    span.end();
}

/// Initializes OpenTelemetry with an OTLP exporter.
///
/// Must run inside a Tokio runtime. Reads:
/// - `OTEL_EXPORTER_OTLP_ENDPOINT` - Collector endpoint (default: http://localhost:4317)
/// - `OTEL_SERVICE_NAME` - Service name (default: itinerary-export)
pub fn init_telemetry() -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "itinerary-export".to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(&endpoint),
        )
        .with_trace_config(Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                KeyValue::new("service.name", service_name),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    if let Some(provider) = tracer.provider() {
        global::set_tracer_provider(provider);
    }

    info!("Telemetry initialized: endpoint={}", endpoint);
    Ok(())
}

/// Flushes pending spans before exit.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
