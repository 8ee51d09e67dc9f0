//! Projection of a node's live anchors into raster pixel space.

use crate::error::{ExportError, ExportResult};
use crate::fragment::{is_web_url, Anchor};
use crate::geometry::Rect;
use crate::surface::NodeHandle;
use tracing::{debug, trace, warn};
use url::Url;

/// Regions at or below this many pixels in either dimension are dropped.
pub const MIN_REGION_EXTENT: f32 = 2.0;

/// A clickable rectangle in raster pixels, relative to the node's top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRegion {
    pub url: Url,
    pub rect: Rect,
}

/// Why a single anchor did not become a [`LinkRegion`].
#[derive(Debug, thiserror::Error)]
pub enum LinkProjectionError {
    #[error("anchor has no href")]
    MissingHref,

    #[error("not a web link: {0}")]
    NotWebLink(String),

    #[error("malformed URL {href}: {source}")]
    MalformedUrl {
        href: String,
        #[source]
        source: url::ParseError,
    },

    #[error("degenerate region {width}x{height} for {href}")]
    Degenerate {
        href: String,
        width: f32,
        height: f32,
    },
}

impl LinkProjectionError {
    /// Expected filtering, as opposed to a link that should have worked.
    fn is_filtered(&self) -> bool {
        matches!(self, Self::MissingHref | Self::NotWebLink(_))
    }
}

/// Projects one anchor given the node's live bounding rectangle.
pub fn project_anchor(
    anchor: &Anchor,
    node_rect: &Rect,
    scale: f32,
) -> Result<LinkRegion, LinkProjectionError> {
    let href = anchor
        .href
        .as_deref()
        .ok_or(LinkProjectionError::MissingHref)?;
    if !is_web_url(href) {
        return Err(LinkProjectionError::NotWebLink(href.to_string()));
    }

    let url = Url::parse(href).map_err(|source| LinkProjectionError::MalformedUrl {
        href: href.to_string(),
        source,
    })?;

    let rect = anchor.rect.relative_to(node_rect.origin()).scale(scale);
    if !rect.is_finite() || rect.width <= MIN_REGION_EXTENT || rect.height <= MIN_REGION_EXTENT {
        return Err(LinkProjectionError::Degenerate {
            href: href.to_string(),
            width: rect.width,
            height: rect.height,
        });
    }

    Ok(LinkRegion { url, rect })
}

/// Projects every qualifying anchor of `node`, read from its live layout.
///
/// Anchors that fail are logged and skipped; only a detached node is an error.
pub fn project_links(node: &NodeHandle, scale: f32) -> ExportResult<Vec<LinkRegion>> {
    let node_rect = node
        .bounding_rect()
        .ok_or_else(|| ExportError::capture("node is not attached to the document"))?;
    let anchors = node
        .anchors()
        .ok_or_else(|| ExportError::capture("node is not attached to the document"))?;

    let mut regions = Vec::with_capacity(anchors.len());
    for anchor in &anchors {
        match project_anchor(anchor, &node_rect, scale) {
            Ok(region) => regions.push(region),
            Err(e) if e.is_filtered() => trace!("Skipping anchor: {}", e),
            Err(e) => warn!("Skipping link region: {}", e),
        }
    }

    debug!(
        "Projected {} of {} anchors into link regions",
        regions.len(),
        anchors.len()
    );
    Ok(regions)
}
