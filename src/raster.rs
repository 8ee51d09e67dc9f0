//! SVG rasterization via resvg.

use crate::error::{ExportError, ExportResult};
use crate::geometry::Size;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace};

/// Lossless raster snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
}

impl RasterImage {
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

/// What a rasterizer is asked to paint.
#[derive(Debug, Clone)]
pub struct RasterSource {
    /// Complete SVG document.
    pub svg: String,
    /// Size of the document in device-independent pixels.
    pub size: Size,
    /// `http(s)` image URLs referenced by the document.
    pub remote_images: Vec<String>,
}

/// Renders an SVG document into pixels.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Rasterizes `source` at `scale` pixels per device-independent pixel.
    async fn rasterize(&self, source: &RasterSource, scale: f32) -> ExportResult<RasterImage>;
}

/// How remote images referenced by a snapshot are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteImagePolicy {
    /// Download and inline them; a refused or non-image response fails the capture.
    #[default]
    Fetch,
    /// Any remote image fails the capture.
    Deny,
}

impl FromStr for RemoteImagePolicy {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fetch" => Ok(Self::Fetch),
            "deny" => Ok(Self::Deny),
            other => Err(ExportError::config(format!(
                "unknown remote image policy '{}', expected 'fetch' or 'deny'",
                other
            ))),
        }
    }
}

/// Rasterizer backed by usvg/resvg with PNG output.
pub struct ResvgRasterizer {
    policy: RemoteImagePolicy,
    client: reqwest::Client,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl ResvgRasterizer {
    /// Creates a rasterizer using the system fonts.
    pub fn new(policy: RemoteImagePolicy) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        debug!("Loaded {} font faces", fontdb.len());
        Self::with_fontdb(policy, Arc::new(fontdb))
    }

    pub fn with_fontdb(policy: RemoteImagePolicy, fontdb: Arc<usvg::fontdb::Database>) -> Self {
        Self {
            policy,
            client: reqwest::Client::new(),
            fontdb,
        }
    }

    pub fn policy(&self) -> RemoteImagePolicy {
        self.policy
    }

    /// Returns the document with every remote image replaced by a data URI.
    async fn inline_remote_images(&self, source: &RasterSource) -> ExportResult<String> {
        if source.remote_images.is_empty() {
            return Ok(source.svg.clone());
        }

        if self.policy == RemoteImagePolicy::Deny {
            return Err(ExportError::capture(format!(
                "remote image not permitted: {}",
                source.remote_images[0]
            )));
        }

        let fetched = join_all(source.remote_images.iter().map(|url| self.fetch_data_uri(url))).await;

        let mut svg = source.svg.clone();
        for (url, data_uri) in source.remote_images.iter().zip(fetched) {
            let data_uri = data_uri?;
            svg = svg.replace(&href_attribute(url), &href_attribute(&data_uri));
        }
        Ok(svg)
    }

    async fn fetch_data_uri(&self, url: &str) -> ExportResult<String> {
        trace!(url = %url, "Fetching remote image");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExportError::capture(format!("failed to fetch image {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::capture(format!(
                "image {} refused with status {}",
                url, status
            )));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if !mime.starts_with("image/") {
            return Err(ExportError::capture(format!(
                "image {} returned non-image content '{}'",
                url, mime
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::capture(format!("failed to read image {}: {}", url, e)))?;

        trace!(url = %url, bytes = bytes.len(), "Fetched remote image");
        Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)))
    }
}

#[async_trait]
impl Rasterizer for ResvgRasterizer {
    async fn rasterize(&self, source: &RasterSource, scale: f32) -> ExportResult<RasterImage> {
        let svg = self.inline_remote_images(source).await?;
        let fontdb = self.fontdb.clone();

        let image = tokio::task::spawn_blocking(move || render_png(&svg, scale, fontdb))
            .await
            .map_err(|e| ExportError::capture(format!("rasterizer task failed: {}", e)))??;

        debug!(
            "Snapshot rasterized: {}x{} px, {} bytes",
            image.width,
            image.height,
            image.png.len()
        );
        Ok(image)
    }
}

fn href_attribute(value: &str) -> String {
    format!(r#"xlink:href="{}""#, quick_xml::escape::escape(value))
}

/// Parses and paints `svg` at `scale`, then PNG-encodes the result.
fn render_png(svg: &str, scale: f32, fontdb: Arc<usvg::fontdb::Database>) -> ExportResult<RasterImage> {
    let mut options = usvg::Options::default();
    options.fontdb = fontdb;

    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|e| ExportError::capture(format!("failed to parse snapshot: {}", e)))?;

    let size = tree.size();
    let (width, height) = Size::new(size.width(), size.height()).scaled_pixels(scale);
    debug!("Rendering snapshot at {}x: {}x{} px", scale, width, height);

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        ExportError::capture(format!("cannot allocate a {}x{} pixmap", width, height))
    })?;

    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    let png = pixmap
        .encode_png()
        .map_err(|e| ExportError::capture(format!("failed to encode PNG: {}", e)))?;

    Ok(RasterImage { width, height, png })
}
