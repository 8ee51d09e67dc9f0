//! Visual snapshot capture.
//!
//! The node is never rasterized in place: a copy of its content is attached
//! to the surface off-screen, with the node's exact size and an opaque
//! background, rasterized, and detached again. Detachment is tied to the
//! [`IsolatedCopy`] guard, so it also happens when rasterization fails or the
//! capture future is dropped.

use crate::error::{ExportError, ExportResult};
use crate::fragment::Fragment;
use crate::geometry::{Point, Size};
use crate::raster::{RasterImage, RasterSource, Rasterizer};
use crate::surface::{Layer, LayerId, NodeHandle, Placement, Surface};
use tracing::{debug, info};

/// Scale used when the caller does not pick one.
pub const DEFAULT_SCALE: f32 = 2.0;

/// Horizontal viewport position of isolated copies.
pub const OFFSCREEN_X: f32 = -99999.0;

/// Background painted under every snapshot.
pub const SNAPSHOT_BACKGROUND: &str = "#ffffff";

/// Off-screen copy of a node, attached for as long as the guard lives.
pub struct IsolatedCopy<'a> {
    surface: &'a Surface,
    id: LayerId,
    remote_images: Vec<String>,
    size: Size,
}

impl<'a> IsolatedCopy<'a> {
    pub fn attach(surface: &'a Surface, fragment: Fragment, size: Size) -> Self {
        let remote_images = fragment.remote_images();
        let id = surface.attach(Layer {
            fragment,
            placement: Placement::Fixed {
                position: Point::new(OFFSCREEN_X, 0.0),
            },
            size,
            background: Some(SNAPSHOT_BACKGROUND.to_string()),
        });
        debug!(layer_id = id, "Isolated copy attached");
        Self {
            surface,
            id,
            remote_images,
            size,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Reads the attached copy back from the surface for rasterization.
    pub fn raster_source(&self) -> ExportResult<RasterSource> {
        let svg = self
            .surface
            .layer_svg(self.id)
            .ok_or_else(|| ExportError::capture("isolated copy was removed before rasterization"))?;
        Ok(RasterSource {
            svg,
            size: self.size,
            remote_images: self.remote_images.clone(),
        })
    }
}

impl Drop for IsolatedCopy<'_> {
    fn drop(&mut self) {
        self.surface.detach(self.id);
        debug!(layer_id = self.id, "Isolated copy detached");
    }
}

/// Captures mounted nodes through a [`Rasterizer`].
pub struct SnapshotCapturer<R> {
    rasterizer: R,
}

impl<R: Rasterizer> SnapshotCapturer<R> {
    pub fn new(rasterizer: R) -> Self {
        Self { rasterizer }
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    /// Rasterizes `node` at `scale`.
    ///
    /// # Errors
    ///
    /// - `scale` is not a positive finite number
    /// - the node is detached or has an empty layout size
    /// - the rasterizer fails
    pub async fn capture(&self, node: &NodeHandle, scale: f32) -> ExportResult<RasterImage> {
        validate_scale(scale)?;

        let size = node
            .offset_size()
            .ok_or_else(|| ExportError::capture("node is not attached to the document"))?;
        if size.is_empty() {
            return Err(ExportError::capture(format!(
                "node has no layout size: {}x{}",
                size.width, size.height
            )));
        }
        let fragment = node
            .fragment()
            .ok_or_else(|| ExportError::capture("node is not attached to the document"))?;

        info!(
            "Capturing node {}: {}x{} at {}x",
            node.id(),
            size.width,
            size.height,
            scale
        );

        let copy = IsolatedCopy::attach(node.surface(), fragment, size);
        let source = copy.raster_source()?;
        let image = self.rasterizer.rasterize(&source, scale).await;
        drop(copy);

        image
    }
}

pub(crate) fn validate_scale(scale: f32) -> ExportResult<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(ExportError::capture(format!("invalid scale {}", scale)))
    }
}
