//! Itinerary Snapshot Export Library
//!
//! This library turns a rendered visual node (an itinerary section laid out as
//! SVG on a [`surface::Surface`]) into a single-page PDF whose page is a
//! lossless raster snapshot of the node, with every web hyperlink of the node
//! re-projected as a clickable region over the image.
//!
//! ## Module Overview
//!
//! - `surface`: live visual document, mounted nodes and layer attachment
//! - `fragment`: laid-out SVG markup together with its anchor geometry
//! - `capture`: off-screen isolation and rasterization of a node
//! - `raster`: rasterizer trait and the resvg-backed implementation
//! - `links`: projection of live anchors into scaled link regions
//! - `assembler`: single-page PDF assembly with link annotations
//! - `export`: export lifecycle, notifier and download sink
//! - `hotels`: hotel list section rendering
//! - `config`, `logging`, `telemetry`: ambient configuration and observability
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use itinerary_export::{
//!     export::{DirectorySink, Exporter, TracingNotifier},
//!     geometry::Point,
//!     hotels::{Hotel, HotelsSection},
//!     raster::{RemoteImagePolicy, ResvgRasterizer},
//!     surface::Surface,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let hotels = vec![Hotel::new("h-1", "Grand Hotel", 5, 3)];
//!     let surface = Surface::new();
//!     let node = surface.mount(HotelsSection::render(&hotels), Point::new(0.0, 0.0));
//!
//!     let exporter = Exporter::new(
//!         ResvgRasterizer::new(RemoteImagePolicy::Fetch),
//!         TracingNotifier,
//!         DirectorySink::new("/tmp"),
//!     );
//!
//!     let job = exporter.export(&node, "itinerary").await;
//!     assert!(job.is_ok());
//! }
//! ```

pub mod assembler;
pub mod capture;
pub mod config;
pub mod error;
pub mod export;
pub mod fragment;
pub mod geometry;
pub mod hotels;
pub mod job;
pub mod links;
pub mod logging;
pub mod raster;
pub mod surface;
pub mod telemetry;

pub use error::{ExportError, ExportResult};
