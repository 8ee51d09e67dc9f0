//! Itinerary PDF Snapshot Exporter
//!
//! Renders the hotel section of an itinerary, mounts it on a surface and
//! exports it as a single-page PDF with clickable hotel links.
//!
//! ## Configuration
//!
//! Environment variables (command-line flags take precedence):
//! - `EXPORT_SCALE`: raster scale multiplier (default: 2)
//! - `EXPORT_OUTPUT_DIR`: directory for the PDF (default: .)
//! - `EXPORT_REMOTE_IMAGES`: `fetch` or `deny` (default: fetch)
//! - `EXPORT_LOG_JSON`: JSON log output (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: enables OTLP trace export when set
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use itinerary_export::{
    config::ExportConfig,
    export::{DirectorySink, Exporter, TracingNotifier},
    geometry::Point,
    hotels::{Hotel, HotelsSection},
    logging, telemetry,
    raster::{RemoteImagePolicy, ResvgRasterizer},
    surface::Surface,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "itinerary-export", version, about = "Export an itinerary hotel list as a PDF snapshot")]
struct Cli {
    /// JSON file with an array of hotels.
    hotels: PathBuf,

    /// Output base name; the file is written as <NAME>.pdf.
    #[arg(long, default_value = "itinerary")]
    name: String,

    /// Output directory.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Raster scale multiplier.
    #[arg(long)]
    scale: Option<f32>,

    /// Fail instead of downloading remote images.
    #[arg(long)]
    deny_remote_images: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ExportConfig::from_env().context("Invalid export configuration")?;
    if let Some(out) = cli.out {
        config.output_dir = out;
    }
    if let Some(scale) = cli.scale {
        config.scale = scale;
    }
    if cli.deny_remote_images {
        config.remote_images = RemoteImagePolicy::Deny;
    }
    config.validate().context("Invalid export configuration")?;

    logging::init_logging(config.log_json).context("Failed to initialize logging")?;

    let otel = std::env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_some();
    if otel {
        if let Err(e) = telemetry::init_telemetry() {
            warn!("Failed to initialize telemetry: {}", e);
        }
    }

    info!(
        "Configuration: scale={}, output_dir={}, remote_images={:?}",
        config.scale,
        config.output_dir.display(),
        config.remote_images
    );

    let raw = std::fs::read_to_string(&cli.hotels)
        .with_context(|| format!("Failed to read {}", cli.hotels.display()))?;
    let hotels: Vec<Hotel> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse hotels from {}", cli.hotels.display()))?;
    info!("Loaded {} hotels", hotels.len());

    let surface = Surface::new();
    let node = surface.mount(HotelsSection::render(&hotels), Point::new(0.0, 0.0));

    let exporter = Exporter::new(
        ResvgRasterizer::new(config.remote_images),
        TracingNotifier,
        DirectorySink::new(&config.output_dir),
    )
    .with_scale(config.scale)?;

    let result = exporter.export(&node, &cli.name).await;

    if otel {
        telemetry::shutdown_telemetry();
    }

    let job = result.context("PDF export failed")?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}
