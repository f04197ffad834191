//! Map surface abstraction
//!
//! A [`MapSurface`] is the rendering backend the overlay draws on: it stores vector
//! sources and styled layers, answers hit queries, moves the camera, shows popups, and
//! delivers pointer/style events to subscribers.
//!
//! Events are not pushed through callbacks. The surface queues a [`Delivery`] for every
//! active subscription of the event's kind, and the host loop drains them with
//! [`MapSurface::take_events`] and hands them to the overlay. A subscription identifier
//! is therefore the detachable "handler" reference.

use crate::feature::{CanonicalCollection, TrailAttributes};
use crate::style::{Filter, LayerSpec};
use crate::viewport::FitRequest;
use std::sync::Arc;

/// Geographic position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Position on the surface in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Event kinds a subscription can listen to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerMove,
    Click,
    /// The style accepts sources and layers; fires once per surface
    StyleReady,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    PointerMove { point: ScreenPoint, lng_lat: LngLat },
    Click { point: ScreenPoint, lng_lat: LngLat },
    StyleReady,
}

impl SurfaceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PointerMove { .. } => EventKind::PointerMove,
            Self::Click { .. } => EventKind::Click,
            Self::StyleReady => EventKind::StyleReady,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupId(pub u64);

/// An event addressed to one subscription
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub subscription: SubscriptionId,
    pub event: SurfaceEvent,
}

/// Pointer cursor affordance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

/// A feature hit by a rendered-feature query
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    /// Layer the feature was rendered by
    pub layer: String,
    pub attributes: TrailAttributes,
}

impl RenderedFeature {
    pub fn id(&self) -> &str {
        &self.attributes.id
    }
}

/// Content of an information popup
#[derive(Debug, Clone, PartialEq)]
pub struct PopupContent {
    pub title: String,
    /// Label/value rows, `-` standing in for missing values
    pub rows: Vec<(String, String)>,
}

/// Placeholder for a missing popup value
pub const MISSING_VALUE: &str = "-";

impl PopupContent {
    /// Popup for a trail: name, distance, duration, pace and description
    pub fn for_trail(attributes: &TrailAttributes) -> Self {
        let or_missing = |value: Option<String>| value.unwrap_or_else(|| MISSING_VALUE.to_string());
        let rows = vec![
            (
                "Distance".to_string(),
                or_missing(attributes.distance.as_ref().map(|d| format!("{} m", d))),
            ),
            (
                "Duration".to_string(),
                or_missing(attributes.duration.as_ref().map(|d| format!("{} s", d))),
            ),
            (
                "Pace".to_string(),
                or_missing(attributes.pace.as_ref().map(|p| p.to_string())),
            ),
            (
                "Description".to_string(),
                or_missing(attributes.description.clone().filter(|d| !d.is_empty())),
            ),
        ];
        Self {
            title: attributes.name.clone(),
            rows,
        }
    }

    /// Plain-text rendering, one row per line
    pub fn to_text(&self) -> String {
        let mut text = format!("Name: {}", self.title);
        for (label, value) in &self.rows {
            text.push('\n');
            text.push_str(label);
            text.push_str(": ");
            text.push_str(value);
        }
        text
    }
}

/// Errors reported by surface operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Source already exists: {0}")]
    DuplicateSource(String),

    #[error("Layer already exists: {0}")]
    DuplicateLayer(String),

    #[error("Source {source_id} is still used by layer {layer_id}")]
    SourceInUse { source_id: String, layer_id: String },

    #[error("Style is not ready yet")]
    StyleNotReady,
}

/// Rendering backend for the trail overlay
///
/// All calls happen on the thread that drives the map; implementations need no locking
/// towards the overlay.
pub trait MapSurface {
    /// Whether sources and layers can be added right now
    fn is_style_ready(&self) -> bool;

    fn add_source(
        &mut self,
        id: &str,
        data: Arc<CanonicalCollection>,
    ) -> Result<(), SurfaceError>;

    /// Remove a source; fails while any layer still references it
    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn has_source(&self, id: &str) -> bool;

    /// Add a layer on top of the existing ones
    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError>;

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn has_layer(&self, id: &str) -> bool;

    /// Replace the filter of an existing layer
    fn set_filter(&mut self, layer_id: &str, filter: Filter) -> Result<(), SurfaceError>;

    /// Features rendered under `point` by any of `layers`, topmost first
    fn query_rendered_features(&self, point: ScreenPoint, layers: &[&str]) -> Vec<RenderedFeature>;

    /// Move the camera so the request's bounds are visible
    fn fit_bounds(&mut self, fit: FitRequest);

    fn subscribe(&mut self, kind: EventKind) -> SubscriptionId;

    /// Subscribe for a single delivery; the surface forgets the subscription once delivered
    fn subscribe_once(&mut self, kind: EventKind) -> SubscriptionId;

    /// Detach a subscription; unknown or already consumed identifiers are ignored
    fn unsubscribe(&mut self, id: SubscriptionId);

    /// Drain queued deliveries in the order the events happened
    fn take_events(&mut self) -> Vec<Delivery>;

    fn open_popup(&mut self, at: LngLat, content: PopupContent) -> PopupId;

    /// Close a popup; unknown identifiers are ignored
    fn close_popup(&mut self, id: PopupId);

    fn set_cursor(&mut self, cursor: Cursor);
}
