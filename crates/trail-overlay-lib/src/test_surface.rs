//! In-memory [`MapSurface`] used by the unit tests
//!
//! Records every operation, counts subscribe/unsubscribe calls, and lets tests decide
//! which features sit under which screen point.

use crate::feature::CanonicalCollection;
use crate::style::{Filter, LayerSpec};
use crate::surface::{
    Cursor, Delivery, EventKind, LngLat, MapSurface, PopupContent, PopupId, RenderedFeature,
    ScreenPoint, SubscriptionId, SurfaceError, SurfaceEvent,
};
use crate::viewport::FitRequest;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct RecordingSurface {
    pub style_ready: bool,
    pub sources: HashMap<String, Arc<CanonicalCollection>>,
    /// Bottom layer first
    pub layers: Vec<LayerSpec>,
    subscriptions: BTreeMap<SubscriptionId, (EventKind, bool)>,
    queue: Vec<Delivery>,
    next_id: u64,
    pub subscribe_calls: usize,
    pub unsubscribe_calls: usize,
    pub fits: Vec<FitRequest>,
    pub popups: BTreeMap<PopupId, (LngLat, PopupContent)>,
    pub popups_opened: usize,
    pub cursor: Cursor,
    /// Feature ids under a screen point, as drawn (bottom first)
    pub hits: HashMap<(i32, i32), Vec<String>>,
    /// Ordered log of mutating operations
    pub log: Vec<String>,
}

impl RecordingSurface {
    pub fn ready() -> Self {
        Self {
            style_ready: true,
            ..Default::default()
        }
    }

    pub fn loading() -> Self {
        Self::default()
    }

    /// Declare which features are under a screen point
    pub fn place(&mut self, x: f32, y: f32, ids: &[&str]) {
        self.hits
            .insert(key(ScreenPoint::new(x, y)), ids.iter().map(|s| s.to_string()).collect());
    }

    /// Queue an event for every matching subscription
    pub fn emit(&mut self, event: SurfaceEvent) {
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

    pub fn finish_loading(&mut self) {
        self.style_ready = true;
        self.emit(SurfaceEvent::StyleReady);
    }

    pub fn hover(&mut self, x: f32, y: f32) {
        self.emit(SurfaceEvent::PointerMove {
            point: ScreenPoint::new(x, y),
            lng_lat: LngLat::new(x as f64, y as f64),
        });
    }

    pub fn click(&mut self, x: f32, y: f32) {
        self.emit(SurfaceEvent::Click {
            point: ScreenPoint::new(x, y),
            lng_lat: LngLat::new(x as f64, y as f64),
        });
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn filter_of(&self, layer_id: &str) -> Option<&Filter> {
        self.layers.iter().find(|l| l.id == layer_id).map(|l| &l.filter)
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn key(point: ScreenPoint) -> (i32, i32) {
    (point.x.round() as i32, point.y.round() as i32)
}

impl MapSurface for RecordingSurface {
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
        if self.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        self.log.push(format!("add_source {}", id));
        self.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if let Some(layer) = self.layers.iter().find(|l| l.source == id) {
            return Err(SurfaceError::SourceInUse {
                source_id: id.to_string(),
                layer_id: layer.id.clone(),
            });
        }
        self.sources
            .remove(id)
            .ok_or_else(|| SurfaceError::SourceNotFound(id.to_string()))?;
        self.log.push(format!("remove_source {}", id));
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError> {
        if self.has_layer(&layer.id) {
            return Err(SurfaceError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(SurfaceError::SourceNotFound(layer.source));
        }
        self.log.push(format!("add_layer {}", layer.id));
        self.layers.push(layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        let index = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| SurfaceError::LayerNotFound(id.to_string()))?;
        self.layers.remove(index);
        self.log.push(format!("remove_layer {}", id));
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn set_filter(&mut self, layer_id: &str, filter: Filter) -> Result<(), SurfaceError> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.id == layer_id)
            .ok_or_else(|| SurfaceError::LayerNotFound(layer_id.to_string()))?;
        layer.filter = filter;
        Ok(())
    }

    fn query_rendered_features(&self, point: ScreenPoint, layers: &[&str]) -> Vec<RenderedFeature> {
        let Some(ids) = self.hits.get(&key(point)) else {
            return Vec::new();
        };
        let mut hits = Vec::new();
        for layer in self.layers.iter().rev().filter(|l| layers.contains(&l.id.as_str())) {
            let Some(source) = self.sources.get(&layer.source) else {
                continue;
            };
            for id in ids.iter().rev() {
                if let Some(feature) = source.get(id).filter(|f| layer.renders(f)) {
                    hits.push(RenderedFeature {
                        layer: layer.id.clone(),
                        attributes: feature.attributes.clone(),
                    });
                }
            }
        }
        hits
    }

    fn fit_bounds(&mut self, fit: FitRequest) {
        self.log.push("fit_bounds".to_string());
        self.fits.push(fit);
    }

    fn subscribe(&mut self, kind: EventKind) -> SubscriptionId {
        self.subscribe_calls += 1;
        let id = SubscriptionId(self.next());
        self.subscriptions.insert(id, (kind, false));
        self.log.push(format!("subscribe {:?}", kind));
        id
    }

    fn subscribe_once(&mut self, kind: EventKind) -> SubscriptionId {
        self.subscribe_calls += 1;
        let id = SubscriptionId(self.next());
        self.subscriptions.insert(id, (kind, true));
        self.log.push(format!("subscribe_once {:?}", kind));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.unsubscribe_calls += 1;
        if let Some((kind, _)) = self.subscriptions.remove(&id) {
            self.log.push(format!("unsubscribe {:?}", kind));
        }
    }

    fn take_events(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.queue)
    }

    fn open_popup(&mut self, at: LngLat, content: PopupContent) -> PopupId {
        let id = PopupId(self.next());
        self.popups_opened += 1;
        self.popups.insert(id, (at, content));
        self.log.push("open_popup".to_string());
        id
    }

    fn close_popup(&mut self, id: PopupId) {
        if self.popups.remove(&id).is_some() {
            self.log.push("close_popup".to_string());
        }
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }
}
