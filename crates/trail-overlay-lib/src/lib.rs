//! Trail Overlay Library - Normalization and Map Overlay Lifecycle for Trail Records
//!
//! This library turns heterogeneous trail records (raw coordinate paths, single GeoJSON
//! features, or GeoJSON feature collections) into one canonical feature collection, and
//! keeps a styled, interactive overlay of that collection in sync with a map surface.
//!
//! # Architecture
//!
//! - **[`RawTrailRecord`]**: Untyped record as handed over by the data-fetch layer
//! - **[`normalize`]**: Pure conversion of records into a [`CanonicalCollection`]
//! - **[`compute_fit`]**: Initial viewport selection for a collection
//! - **[`MapSurface`]**: Abstraction over the rendering backend (sources, layers, events)
//! - **[`OverlaySynchronizer`]**: Installs, re-installs and tears down the overlay, and
//!   reacts to hover/click events
//!
//! # Data Flow
//!
//! raw records -> [`normalize`] -> [`CanonicalCollection`] -> [`OverlaySynchronizer::present`]
//! -> rendered layers + interaction state

mod feature;
mod normalize;
mod overlay;
mod record;
mod style;
mod surface;
pub mod viewport;

#[cfg(test)]
mod test_surface;

// Public API exports
pub use feature::{
    AttributePatch, CanonicalCollection, CanonicalFeature, DEFAULT_TRAIL_NAME, DisplayValue,
    GeometryKind, TrailAttributes, TrailGeometry,
};
pub use normalize::{DropReason, NormalizeReport, normalize, normalize_with_report};
pub use overlay::{OverlayState, OverlaySynchronizer};
pub use record::{RawTrailRecord, load_records};
pub use style::{
    Color, Filter, HIGHLIGHT_LAYER_ID, LINE_LAYER_ID, LayerSpec, NO_MATCH_ID, OverlayConfig,
    POINT_LAYER_ID, Paint, SOURCE_ID,
};
pub use surface::{
    Cursor, Delivery, EventKind, LngLat, MISSING_VALUE, MapSurface, PopupContent, PopupId,
    RenderedFeature, ScreenPoint, SubscriptionId, SurfaceError, SurfaceEvent,
};
pub use viewport::{Camera, Envelope, FitConfig, FitRequest, compute_fit};

/// Error types for loading trail records
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid records document: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
