//! [`MapSurface`] backed by a walkers map
//!
//! The surface keeps a retained [`Scene`] (sources, layers, popups) that the
//! [`OverlayPlugin`](crate::app::plugin::OverlayPlugin) paints every frame. While
//! painting, the plugin records the screen geometry of every drawn feature and the raw
//! pointer input of the frame; [`WalkersSurface::end_frame`] then turns that input into
//! deliveries for the active subscriptions. The style counts as ready once the first
//! frame has been drawn.

use egui::{Pos2, Rect};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use trail_overlay_lib::{
    CanonicalCollection, Cursor, Delivery, EventKind, Filter, FitRequest, LayerSpec, LngLat,
    MapSurface, PopupContent, PopupId, RenderedFeature, ScreenPoint, SubscriptionId,
    SurfaceError, SurfaceEvent,
};

/// Extra pixels around a drawn line that still count as hitting it
pub const HIT_TOLERANCE: f32 = 4.0;

/// Screen geometry of one feature as drawn by one layer
#[derive(Debug, Clone, PartialEq)]
pub enum DrawnShape {
    /// Polylines with their stroke width
    Lines { parts: Vec<Vec<Pos2>>, width: f32 },
    Circle { center: Pos2, radius: f32 },
}

impl DrawnShape {
    pub fn contains(&self, pos: Pos2) -> bool {
        match self {
            Self::Lines { parts, width } => {
                let reach = width / 2.0 + HIT_TOLERANCE;
                parts.iter().any(|part| {
                    part.windows(2)
                        .any(|w| distance_to_segment(pos, w[0], w[1]) <= reach)
                })
            }
            Self::Circle { center, radius } => center.distance(pos) <= radius + HIT_TOLERANCE,
        }
    }
}

fn distance_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let length_sq = ab.length_sq();
    if length_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / length_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// A feature painted in the last frame
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnFeature {
    pub layer: String,
    pub source: String,
    /// Index into the source collection
    pub feature: usize,
    pub shape: DrawnShape,
}

/// Retained map content shared between the surface and the plugin
#[derive(Debug, Default)]
pub struct Scene {
    pub sources: HashMap<String, Arc<CanonicalCollection>>,
    /// Bottom layer first
    pub layers: Vec<LayerSpec>,
    pub popups: BTreeMap<PopupId, (LngLat, PopupContent)>,
    /// Features drawn in the last frame, in paint order
    pub drawn: Vec<DrawnFeature>,
    /// Pointer input captured while drawing, oldest first
    pub input: Vec<SurfaceEvent>,
    /// Map area of the last frame
    pub viewport: Option<Rect>,
    pub frames_drawn: u64,
    /// Last pointer position over the map
    pub last_hover: Option<Pos2>,
}

pub type SharedScene = Arc<RwLock<Scene>>;

/// The map surface of the viewer
pub struct WalkersSurface {
    scene: SharedScene,
    style_ready: bool,
    subscriptions: BTreeMap<SubscriptionId, (EventKind, bool)>,
    queue: Vec<Delivery>,
    next_id: u64,
    pending_fit: Option<FitRequest>,
    cursor: Cursor,
}

impl Default for WalkersSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl WalkersSurface {
    pub fn new() -> Self {
        Self {
            scene: Arc::new(RwLock::new(Scene::default())),
            style_ready: false,
            subscriptions: BTreeMap::new(),
            queue: Vec::new(),
            next_id: 0,
            pending_fit: None,
            cursor: Cursor::Default,
        }
    }

    /// Scene handle for the plugin
    pub fn scene(&self) -> SharedScene {
        self.scene.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Scene> {
        self.scene.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Scene> {
        self.scene.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Map area of the last drawn frame
    pub fn viewport(&self) -> Option<Rect> {
        self.read().viewport
    }

    /// Viewport change requested since the last call
    pub fn take_pending_fit(&mut self) -> Option<FitRequest> {
        self.pending_fit.take()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Process what the plugin captured during the frame
    ///
    /// Emits the one-time style-ready notification after the first drawn frame, then
    /// the frame's pointer input in order.
    pub fn end_frame(&mut self) {
        let (input, drawn_any_frame) = {
            let mut scene = self.write();
            (std::mem::take(&mut scene.input), scene.frames_drawn > 0)
        };

        if !self.style_ready && drawn_any_frame {
            self.style_ready = true;
            tracing::debug!("Map style ready");
            self.emit(SurfaceEvent::StyleReady);
        }
        for event in input {
            self.emit(event);
        }
    }

    fn emit(&mut self, event: SurfaceEvent) {
        let kind = event.kind();
        let targets: Vec<(SubscriptionId, bool)> = self
            .subscriptions
            .iter()
            .filter(|(_, (k, _))| *k == kind)
            .map(|(id, (_, once))| (*id, *once))
            .collect();
        for (id, once) in targets {
            if once {
                self.subscriptions.remove(&id);
            }
            self.queue.push(Delivery {
                subscription: id,
                event: event.clone(),
            });
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn add_subscription(&mut self, kind: EventKind, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id());
        self.subscriptions.insert(id, (kind, once));
        id
    }

    #[cfg(test)]
    fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }
}

impl MapSurface for WalkersSurface {
    fn is_style_ready(&self) -> bool {
        self.style_ready
    }

    fn add_source(
        &mut self,
        id: &str,
        data: Arc<CanonicalCollection>,
    ) -> Result<(), SurfaceError> {
        if !self.style_ready {
            return Err(SurfaceError::StyleNotReady);
        }
        let mut scene = self.write();
        if scene.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        scene.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        let mut scene = self.write();
        if let Some(layer) = scene.layers.iter().find(|l| l.source == id) {
            return Err(SurfaceError::SourceInUse {
                source_id: id.to_string(),
                layer_id: layer.id.clone(),
            });
        }
        scene
            .sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::SourceNotFound(id.to_string()))
    }

    fn has_source(&self, id: &str) -> bool {
        self.read().sources.contains_key(id)
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError> {
        let mut scene = self.write();
        if scene.layers.iter().any(|l| l.id == layer.id) {
            return Err(SurfaceError::DuplicateLayer(layer.id));
        }
        if !scene.sources.contains_key(&layer.source) {
            return Err(SurfaceError::SourceNotFound(layer.source));
        }
        scene.layers.push(layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        let mut scene = self.write();
        let index = scene
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| SurfaceError::LayerNotFound(id.to_string()))?;
        scene.layers.remove(index);
        scene.drawn.retain(|d| d.layer != id);
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.read().layers.iter().any(|l| l.id == id)
    }

    fn set_filter(&mut self, layer_id: &str, filter: Filter) -> Result<(), SurfaceError> {
        let mut scene = self.write();
        let layer = scene
            .layers
            .iter_mut()
            .find(|l| l.id == layer_id)
            .ok_or_else(|| SurfaceError::LayerNotFound(layer_id.to_string()))?;
        layer.filter = filter;
        Ok(())
    }

    fn query_rendered_features(&self, point: ScreenPoint, layers: &[&str]) -> Vec<RenderedFeature> {
        let scene = self.read();
        let pos = Pos2::new(point.x, point.y);
        if !scene.viewport.is_some_and(|viewport| viewport.contains(pos)) {
            return Vec::new();
        }

        scene
            .drawn
            .iter()
            .rev()
            .filter(|drawn| layers.contains(&drawn.layer.as_str()) && drawn.shape.contains(pos))
            .filter_map(|drawn| {
                let feature = scene.sources.get(&drawn.source)?.features().get(drawn.feature)?;
                Some(RenderedFeature {
                    layer: drawn.layer.clone(),
                    attributes: feature.attributes.clone(),
                })
            })
            .collect()
    }

    fn fit_bounds(&mut self, fit: FitRequest) {
        self.pending_fit = Some(fit);
    }

    fn subscribe(&mut self, kind: EventKind) -> SubscriptionId {
        self.add_subscription(kind, false)
    }

    fn subscribe_once(&mut self, kind: EventKind) -> SubscriptionId {
        self.add_subscription(kind, true)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.remove(&id);
    }

    fn take_events(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.queue)
    }

    fn open_popup(&mut self, at: LngLat, content: PopupContent) -> PopupId {
        let id = PopupId(self.next_id());
        self.write().popups.insert(id, (at, content));
        id
    }

    fn close_popup(&mut self, id: PopupId) {
        self.write().popups.remove(&id);
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }
}
