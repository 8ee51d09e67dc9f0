//! Live visual document.
//!
//! A [`Surface`] is the document body: an ordered set of layers, each holding
//! a [`Fragment`]. In-flow layers scroll with the viewport, fixed layers do
//! not. [`NodeHandle`] is the read-only view of a mounted in-flow layer that
//! exports start from.

use crate::fragment::{Anchor, Fragment};
use crate::geometry::{Point, Rect, Size};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub type LayerId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Part of the normal flow, at a document position.
    Flow { origin: Point },
    /// Pinned to a viewport position.
    Fixed { position: Point },
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub fragment: Fragment,
    pub placement: Placement,
    pub size: Size,
    /// Opaque fill painted under the fragment.
    pub background: Option<String>,
}

impl Layer {
    /// Standalone SVG document of this layer as it would be painted.
    pub fn to_svg_document(&self) -> String {
        self.fragment
            .to_svg_document(self.size, self.background.as_deref())
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    next_id: LayerId,
    scroll: Point,
    layers: BTreeMap<LayerId, Layer>,
}

/// Shared handle to a live document.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    state: Arc<Mutex<SurfaceState>>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mounts `fragment` in flow at `origin` and returns the live node.
    pub fn mount(&self, fragment: Fragment, origin: Point) -> NodeHandle {
        let size = fragment.size();
        let id = self.attach(Layer {
            fragment,
            placement: Placement::Flow { origin },
            size,
            background: None,
        });
        NodeHandle {
            surface: self.clone(),
            id,
        }
    }

    pub fn attach(&self, layer: Layer) -> LayerId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.layers.insert(id, layer);
        debug!(layer_id = id, "Layer attached");
        id
    }

    pub fn detach(&self, id: LayerId) -> Option<Layer> {
        let removed = self.lock().layers.remove(&id);
        if removed.is_some() {
            debug!(layer_id = id, "Layer detached");
        }
        removed
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.lock().layers.contains_key(&id)
    }

    pub fn layer_count(&self) -> usize {
        self.lock().layers.len()
    }

    /// Number of fixed layers currently attached.
    pub fn fixed_layer_count(&self) -> usize {
        self.lock()
            .layers
            .values()
            .filter(|layer| matches!(layer.placement, Placement::Fixed { .. }))
            .count()
    }

    /// SVG document of an attached layer.
    pub fn layer_svg(&self, id: LayerId) -> Option<String> {
        self.lock().layers.get(&id).map(Layer::to_svg_document)
    }

    pub fn scroll_to(&self, offset: Point) {
        self.lock().scroll = offset;
    }

    pub fn scroll_offset(&self) -> Point {
        self.lock().scroll
    }

    fn with_layer<T>(&self, id: LayerId, f: impl FnOnce(&Layer, Point) -> T) -> Option<T> {
        let state = self.lock();
        state.layers.get(&id).map(|layer| f(layer, state.scroll))
    }
}

fn viewport_rect(layer: &Layer, scroll: Point) -> Rect {
    let origin = match layer.placement {
        Placement::Flow { origin } => Point::new(origin.x - scroll.x, origin.y - scroll.y),
        Placement::Fixed { position } => position,
    };
    Rect::from_origin_size(origin, layer.size)
}

/// A mounted node, read through the surface on every call.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    surface: Surface,
    id: LayerId,
}

impl NodeHandle {
    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn is_attached(&self) -> bool {
        self.surface.contains(self.id)
    }

    /// Layout size, independent of scroll.
    pub fn offset_size(&self) -> Option<Size> {
        self.surface.with_layer(self.id, |layer, _| layer.size)
    }

    /// Bounding rectangle relative to the viewport.
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.surface
            .with_layer(self.id, |layer, scroll| viewport_rect(layer, scroll))
    }

    /// Anchors with their live viewport-relative rectangles.
    pub fn anchors(&self) -> Option<Vec<Anchor>> {
        self.surface.with_layer(self.id, |layer, scroll| {
            let origin = viewport_rect(layer, scroll).origin();
            layer
                .fragment
                .anchors()
                .iter()
                .map(|anchor| Anchor {
                    href: anchor.href.clone(),
                    rect: anchor.rect.translate(origin.x, origin.y),
                })
                .collect()
        })
    }

    /// Deep copy of the node's content.
    pub fn fragment(&self) -> Option<Fragment> {
        self.surface
            .with_layer(self.id, |layer, _| layer.fragment.clone())
    }

    /// Re-renders the node in place.
    pub fn replace_fragment(&self, fragment: Fragment) -> bool {
        let mut state = self.surface.lock();
        match state.layers.get_mut(&self.id) {
            Some(layer) => {
                layer.size = fragment.size();
                layer.fragment = fragment;
                true
            }
            None => false,
        }
    }

    pub fn unmount(&self) -> bool {
        self.surface.detach(self.id).is_some()
    }
}
